//! This is the `ConfigFile` struct.
//!
//! This is for finding the right default locations for the various configuration files of
//! `commute-rs`.  This is a configuration file/struct neutral loading engine, storing only the
//! base directory and with `load()` read the proper file or the default one.
//!
//! Every configuration file is HCL and carries a `version` field that must match what the
//! consumer expects, see [`Versioned`].
//!
//! This encapsulates the configuration file, available with `.inner()` or `.inner_mut()`.
//!

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use eyre::{eyre, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::makepath;

/// Main name for the directory base
const TAG: &str = "commute-rs";

/// Anything stored in a versioned configuration file.
///
pub trait Versioned {
    /// Version found in the file
    fn version(&self) -> usize;
}

/// Tie a configuration struct to its file name and expected version.
///
pub trait IntoConfig: Versioned {
    /// Default filename inside the configuration directory
    const FILENAME: &'static str;
    /// Version we know how to read
    const VERSION: usize;
}

/// A loaded configuration file of type `T`.
///
#[derive(Debug)]
pub struct ConfigFile<T: Debug + DeserializeOwned + IntoConfig> {
    /// This is the base directory for all files.
    basedir: PathBuf,
    /// Actual path of the loaded file
    path: PathBuf,
    inner: T,
}

/// Returns the path of the default config directory
///
#[tracing::instrument]
pub fn config_path() -> Result<PathBuf> {
    let base = BaseDirs::new().ok_or_else(|| eyre!("No home directory, can not continue"))?;

    #[cfg(unix)]
    let base: PathBuf = makepath!(base.home_dir(), ".config", TAG);

    #[cfg(windows)]
    let base: PathBuf = makepath!(base.data_local_dir(), TAG);

    debug!("base = {base:?}");
    Ok(base)
}

impl<T> ConfigFile<T>
where
    T: Debug + DeserializeOwned + IntoConfig,
{
    /// Returns the path of the default config file for `T`
    ///
    #[tracing::instrument]
    pub fn default_file() -> Result<PathBuf> {
        let cfg = config_path()?.join(T::FILENAME);
        debug!("default = {cfg:?}");
        Ok(cfg)
    }

    /// Load the file and return a struct T in the right format.
    ///
    /// Use the following search path:
    /// - file specified on CLI
    /// - default basedir (based on $HOME or $LOCALAPPDATA)
    ///
    #[tracing::instrument]
    pub fn load(fname: Option<&Path>) -> Result<ConfigFile<T>> {
        let basedir = config_path().unwrap_or_default();

        let fname = match fname {
            Some(fname) => fname.to_path_buf(),
            None => Self::default_file()?,
        };

        if !fname.exists() {
            return Err(eyre!(
                "Unknown config file {:?} and no default in {:?}",
                fname,
                basedir.join(T::FILENAME)
            ));
        }
        let path = fname.canonicalize()?;

        trace!("Loading config file {path:?}");
        let data = fs::read_to_string(&path)?;
        let inner = Self::parse(&data)?;
        Ok(ConfigFile {
            basedir,
            path,
            inner,
        })
    }

    /// Parse HCL text and check the version.
    ///
    #[tracing::instrument(skip(data))]
    pub fn parse(data: &str) -> Result<T> {
        let inner: T = hcl::from_str(data)?;
        debug!("struct data = {inner:?}");

        if inner.version() != T::VERSION {
            return Err(eyre!(
                "Bad config file version v{}, need v{}",
                inner.version(),
                T::VERSION
            ));
        }
        Ok(inner)
    }

    /// Returns the path of the config directory
    ///
    pub fn config_path(&self) -> &Path {
        &self.basedir
    }

    /// Returns the path of the loaded file
    ///
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the inner configuration
    ///
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Return the inner configuration as mutable
    ///
    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume and return the inner configuration
    ///
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde::Deserialize;
    use tempfile::NamedTempFile;

    use super::*;

    #[derive(Debug, Default, Deserialize)]
    struct Foo {
        version: usize,
        pub name: String,
    }

    impl Versioned for Foo {
        fn version(&self) -> usize {
            self.version
        }
    }

    impl IntoConfig for Foo {
        const FILENAME: &'static str = "foo.hcl";
        const VERSION: usize = 2;
    }

    fn write_tmp(data: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(data.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_config_load_file() -> Result<()> {
        let f = write_tmp("version = 2\nname = \"bar\"\n");

        let cfg = ConfigFile::<Foo>::load(Some(f.path()))?;
        let inner = cfg.inner();
        assert_eq!(2, inner.version());
        assert_eq!("bar", inner.name);
        Ok(())
    }

    #[test]
    fn test_config_bad_version() {
        let f = write_tmp("version = 1\nname = \"bar\"\n");

        let cfg = ConfigFile::<Foo>::load(Some(f.path()));
        assert!(cfg.is_err());
    }

    #[test]
    fn test_config_missing_file() {
        let cfg = ConfigFile::<Foo>::load(Some(Path::new("/nonexistent/foo.hcl")));
        assert!(cfg.is_err());
    }

    #[test]
    fn test_default_file_name() -> Result<()> {
        let p = ConfigFile::<Foo>::default_file()?;
        assert!(p.ends_with("foo.hcl"));
        Ok(())
    }
}
