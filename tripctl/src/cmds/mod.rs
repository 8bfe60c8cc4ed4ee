pub use geo::*;
pub use list::*;
pub use replay::*;
pub use route::*;

mod geo;
mod list;
mod replay;
mod route;
