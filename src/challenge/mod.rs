//! Challenge detection and solving.

mod context;
mod detector;
mod solver;
mod two_captcha;

pub use context::ChallengeContext;
pub use detector::{detect_site_key, is_challenge_frame};
pub use solver::{ChallengeSolver, PollPolicy, PollStatus, SolverApi, SolverError};
pub use two_captcha::TwoCaptchaApi;
