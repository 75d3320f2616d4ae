/// Parameters shared by the commands
///
/// ```
/// let config = pcbro::Config::default().threshold(1e4);
/// assert_eq!(config.pitch, 0.2);
/// assert_eq!(config.minimum, 5.);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// spacing between adjacent wires of a plane [cm]
    pub pitch: f64,
    /// minimum activity sum for a frame to be kept
    pub threshold: f64,
    /// samples must be strictly above this value to count toward the activity
    pub minimum: f64,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            pitch: 0.2,
            threshold: 5000.,
            minimum: 5.,
        }
    }
}
impl Config {
    pub fn pitch(self, pitch: f64) -> Self {
        Self { pitch, ..self }
    }
    pub fn threshold(self, threshold: f64) -> Self {
        Self { threshold, ..self }
    }
    pub fn minimum(self, minimum: f64) -> Self {
        Self { minimum, ..self }
    }
}
