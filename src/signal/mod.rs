//! Signal processing: smoothing and peak picking on frequency waveforms.

pub mod peaks;
pub mod savgol;

pub use peaks::{Peak, PeakDetector};
pub use savgol::SavitzkyGolay;
