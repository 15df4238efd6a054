//! Data model shared by the pipeline stages.

pub mod http;
pub mod image;
pub mod reference;
pub mod result;

pub use self::http::*;
pub use self::image::*;
pub use self::reference::*;
pub use self::result::*;
