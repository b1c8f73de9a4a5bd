mod assessment;
mod audio;
mod credential;
mod engine;
mod error;
mod session;
pub mod ssml;
pub mod voice;

pub use assessment::*;
pub use audio::*;
pub use credential::*;
pub use engine::*;
pub use error::*;
pub use session::*;
