//! Frame activity filter
//!
//! The activity of a frame is the sum of the baseline subtracted samples of the
//! collection channels (the left half of the frame) that are above a minimum value.
//! The baseline of a channel is the median of its samples.

use crate::{
    frames::{Frame, FrameStore, Result},
    Config,
};

/// Median of the values, the mean of the 2 middle values for an even count
pub fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

/// Returns the activity of the frame
pub fn activity(frame: &Frame, minimum: f64) -> f64 {
    let collection = frame.samples().columns(0, frame.cols() / 2);
    let mut sum = 0f64;
    for channel in collection.column_iter() {
        let baseline = median(channel.iter().cloned().collect());
        sum += channel
            .iter()
            .map(|x| x - baseline)
            .filter(|&x| x > minimum)
            .sum::<f64>();
    }
    sum
}

/// Copies the frames of `input` with an activity reaching `config.threshold`
/// into `output`, returns the keys of the copied frames
///
/// The output store is written even if no frame is kept.
pub fn filter<I, O>(input: &mut I, output: &mut O, config: &Config) -> Result<Vec<String>>
where
    I: FrameStore,
    O: FrameStore,
{
    let mut kept = vec![];
    for key in input.frame_keys() {
        let frame = input.fetch(&key)?;
        let act = activity(&frame, config.minimum);
        log::debug!("{key}: activity {act}");
        if act < config.threshold {
            continue;
        }
        log::info!("save {key}");
        kept.push((key, frame));
    }
    output.store(&kept)?;
    Ok(kept.into_iter().map(|(key, _)| key).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{frame_key, MemoryStore, NpzStore, SampleType};

    /// 10 ticks by 4 channels, a pulse on the first channel
    fn pulse(height: f64) -> Frame {
        let mut samples = vec![3f64; 40];
        for tick in 4..7 {
            samples[tick * 4] += height;
        }
        Frame::from_row_slice(10, 4, &samples)
    }

    #[test]
    fn medians() {
        assert_eq!(median(vec![3., 1., 2.]), 2.);
        assert_eq!(median(vec![4., 1., 3., 2.]), 2.5);
        assert!(median(vec![]).is_nan());
    }

    #[test]
    fn zero_frame() {
        let frame = Frame::from_row_slice(10, 10, &[0.; 100]);
        assert_eq!(activity(&frame, 5.), 0.);
        let mut input = MemoryStore::new();
        input.insert("frame_zero_1", frame);
        let mut output = MemoryStore::new();
        assert!(filter(&mut input, &mut output, &Config::default())
            .unwrap()
            .is_empty());
        assert!(output.is_empty());
    }

    #[test]
    fn baseline_subtraction() {
        // baseline is 3, the pulse is 3 ticks of 100 above it
        assert_eq!(activity(&pulse(100.), 5.), 300.);
        // samples must be strictly above the minimum
        assert_eq!(activity(&pulse(5.), 5.), 0.);
        assert_eq!(activity(&pulse(6.), 5.), 18.);
    }

    #[test]
    fn right_half_ignored() {
        let mut samples = vec![0f64; 40];
        for tick in 0..3 {
            samples[tick * 4 + 3] = 1e4;
        }
        assert_eq!(activity(&Frame::from_row_slice(10, 4, &samples), 5.), 0.);
    }

    #[test]
    fn thresholds() {
        let mut input = MemoryStore::new();
        input
            .insert(frame_key("gauss0", 1), pulse(2000.))
            .insert(frame_key("gauss0", 2), pulse(1000.))
            .insert("channels_gauss0_1", pulse(2000.));
        let mut output = MemoryStore::new();
        let kept = filter(&mut input, &mut output, &Config::default()).unwrap();
        assert_eq!(kept, vec!["frame_gauss0_1"]);
        assert_eq!(output.keys(), kept);
        // kept unmodified, full width
        assert_eq!(output.get("frame_gauss0_1"), Some(&pulse(2000.)));

        let config = Config::default().threshold(3000.);
        filter(&mut input, &mut output, &config).unwrap();
        assert_eq!(output.keys(), vec!["frame_gauss0_1", "frame_gauss0_2"]);
        let config = Config::default().minimum(1500.);
        filter(&mut input, &mut output, &config).unwrap();
        assert_eq!(output.keys(), vec!["frame_gauss0_1"]);
    }

    #[test]
    fn idempotent() {
        let mut input = MemoryStore::new();
        for k in 0..6 {
            input.insert(frame_key("orig", k), pulse(1000. * k as f64));
        }
        let config = Config::default();
        let mut once = MemoryStore::new();
        filter(&mut input, &mut once, &config).unwrap();
        let mut twice = MemoryStore::new();
        filter(&mut once.clone(), &mut twice, &config).unwrap();
        assert_eq!(once.keys(), twice.keys());
        assert_eq!(once.keys(), vec!["frame_orig_2", "frame_orig_3", "frame_orig_4", "frame_orig_5"]);
    }

    #[test]
    fn npz_archives() {
        let scratch = |name: &str| {
            std::env::temp_dir().join(format!("pcbro-activity-{}-{}.npz", name, std::process::id()))
        };
        let (input_path, output_path) = (scratch("in"), scratch("out"));
        let frames = vec![
            (frame_key("gauss0", 1), pulse(2000.).sample_type(SampleType::I16)),
            (frame_key("gauss0", 2), pulse(10.).sample_type(SampleType::I16)),
            ("channels_gauss0_1".to_string(), pulse(2000.)),
        ];
        NpzStore::create(&input_path).store(&frames).unwrap();

        let mut input = NpzStore::open(&input_path).unwrap();
        let mut output = NpzStore::create(&output_path);
        let kept = filter(&mut input, &mut output, &Config::default()).unwrap();
        assert_eq!(kept, vec!["frame_gauss0_1"]);

        let mut output = NpzStore::open(&output_path).unwrap();
        assert_eq!(output.keys(), kept);
        let frame = output.fetch("frame_gauss0_1").unwrap();
        assert_eq!(frame, frames[0].1);
        assert_eq!(frame.element_type(), SampleType::I16);
        std::fs::remove_file(&input_path).unwrap();
        std::fs::remove_file(&output_path).unwrap();
    }
}
