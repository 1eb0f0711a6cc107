pub mod screenshot;

pub use screenshot::{InsertOutcome, NewScreenshot, ScreenshotRecord};
