//! JSON parameter store with self-healing load
//!
//! Every detector and predictor owns one parameter file. Loading is two-phase:
//! when the file is missing or does not parse, built-in defaults are written to
//! the same path and read back. Only a failed write is reported as an error.

use crate::{CvError, CvResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Load parameters from `path`, regenerating the file from `defaults` when it
/// can not be used.
pub fn load_or_init<P, F>(path: &Path, defaults: F) -> CvResult<P>
where
    P: Serialize + DeserializeOwned,
    F: FnOnce() -> P,
{
    match read_params(path) {
        Ok(params) => {
            debug!("Params loaded from {}", path.display());
            Ok(params)
        }
        Err(err) => {
            warn!("{}. Writing defaults.", err);
            write_params(path, &defaults())?;
            let params = read_params(path)?;
            warn!(
                "Can not find params file. Created and reloaded {}",
                path.display()
            );
            Ok(params)
        }
    }
}

pub fn read_params<P: DeserializeOwned>(path: &Path) -> CvResult<P> {
    let text = fs::read_to_string(path).map_err(|e| CvError::param_io(path, e))?;
    serde_json::from_str(&text).map_err(|e| CvError::param_format(path, e))
}

pub fn write_params<P: Serialize>(path: &Path, params: &P) -> CvResult<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| CvError::param_io(path, e))?;
    }
    let text = serde_json::to_string_pretty(params).map_err(|e| CvError::param_format(path, e))?;
    fs::write(path, text).map_err(|e| CvError::param_io(path, e))?;
    debug!("Inited params at {}", path.display());
    Ok(())
}
