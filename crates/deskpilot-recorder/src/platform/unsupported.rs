use crate::source::{InputSource, Subscription};
use deskpilot_core::{Error, Result};
use std::sync::Arc;

pub struct UnsupportedSource;

pub fn source() -> Arc<dyn InputSource> {
    Arc::new(UnsupportedSource)
}

impl InputSource for UnsupportedSource {
    fn subscribe(&self) -> Result<Subscription> {
        Err(Error::unsupported("Input recording", "native"))
    }
}
