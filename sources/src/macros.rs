//! Define our own macro to simplify the code
//!

/// Call the HTTP client with the proper arguments
///
/// - anonymous or key-in-query GET with query parameters
///
#[macro_export]
macro_rules! http_get {
    ($self:ident, $url:ident, $query:expr) => {
        $self
            .client
            .get($url)
            .header(
                "user-agent",
                format!("{}/{}", crate_name!(), crate_version!()),
            )
            .header("accept", "application/json")
            .query($query)
            .send()
    };
}
