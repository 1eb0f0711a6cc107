pub mod bridge;
pub mod pause;
pub mod phash;
pub mod sampler;

pub use bridge::{CommandGrabber, CommandWindowProbe, ScreenGrabber, WindowProbe};
pub use pause::PauseGate;
pub use phash::{compute_phash, is_near_duplicate, Fingerprint};
pub use sampler::{capture_loop, frame_name, CaptureSampler, CycleOutcome, FRAME_NAME_FORMAT};
