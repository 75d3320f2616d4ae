use super::{Frame, FrameError, FrameStore, Result, SampleType};
use npyz::{
    npz::{NpzArchive, NpzWriter},
    AutoSerialize, DType, NpyFile, Order, WriterBuilder,
};
use std::{
    fmt,
    fs::File,
    io::{self, BufReader, Read, Seek, Write},
    path::{Path, PathBuf},
    time::Instant,
};

type Archive = NpzArchive<BufReader<File>>;

/// Frame store backed by a numpy `.npz` archive
pub struct NpzStore {
    path: PathBuf,
    archive: Option<Archive>,
    keys: Vec<String>,
}

/// Summary of an archived array
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayInfo {
    pub key: String,
    pub shape: Vec<u64>,
    pub dtype: String,
}
impl fmt::Display for ArrayInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<32} {:<16} {}",
            if super::is_frame_key(&self.key) { "*" } else { " " },
            self.key,
            format!("{:?}", self.shape),
            self.dtype
        )
    }
}

fn open_archive(path: &Path) -> Result<(Archive, Vec<String>)> {
    let file = File::open(path).map_err(|e| FrameError::Io(e, path.to_path_buf()))?;
    let archive =
        NpzArchive::new(BufReader::new(file)).map_err(|e| FrameError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let keys = archive.array_names().map(|name| name.to_owned()).collect();
    Ok((archive, keys))
}

/// Row-major copy of the samples of a `rows`x`cols` array stored in `order`
fn row_major<T: Copy>(samples: Vec<T>, rows: usize, cols: usize, order: Order) -> io::Result<Vec<T>> {
    if samples.len() != rows * cols {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} samples instead of {rows}x{cols}", samples.len()),
        ));
    }
    Ok(match order {
        Order::C => samples,
        Order::Fortran => {
            let column_major = &samples;
            (0..rows)
                .flat_map(move |i| (0..cols).map(move |j| column_major[j * rows + i]))
                .collect()
        }
    })
}
fn widen<T: Into<f64>>(samples: Vec<T>) -> Vec<f64> {
    samples.into_iter().map(Into::into).collect()
}
fn read_frame<R: Read>(
    npy: NpyFile<R>,
    rows: usize,
    cols: usize,
    sample_type: SampleType,
) -> io::Result<Frame> {
    use SampleType::*;
    let order = npy.order();
    let samples = match sample_type {
        I64 => {
            let samples = row_major(npy.into_vec::<i64>()?, rows, cols, order)?;
            return Ok(Frame::from_i64(rows, cols, samples));
        }
        U64 => {
            let samples = row_major(npy.into_vec::<u64>()?, rows, cols, order)?;
            return Ok(Frame::from_u64(rows, cols, samples));
        }
        F64 => row_major(npy.into_vec::<f64>()?, rows, cols, order)?,
        F32 => widen(row_major(npy.into_vec::<f32>()?, rows, cols, order)?),
        I8 => widen(row_major(npy.into_vec::<i8>()?, rows, cols, order)?),
        I16 => widen(row_major(npy.into_vec::<i16>()?, rows, cols, order)?),
        I32 => widen(row_major(npy.into_vec::<i32>()?, rows, cols, order)?),
        U8 => widen(row_major(npy.into_vec::<u8>()?, rows, cols, order)?),
        U16 => widen(row_major(npy.into_vec::<u16>()?, rows, cols, order)?),
        U32 => widen(row_major(npy.into_vec::<u32>()?, rows, cols, order)?),
    };
    Ok(Frame::from_row_slice(rows, cols, &samples).sample_type(sample_type))
}

fn write_array<W, T, I>(npz: &mut NpzWriter<W>, name: &str, shape: &[u64], data: I) -> io::Result<()>
where
    W: Write + Seek,
    T: AutoSerialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = npz
        .array(name, Default::default())?
        .default_dtype()
        .shape(shape)
        .begin_nd()?;
    writer.extend(data)?;
    writer.finish()
}
fn write_frame<W: Write + Seek>(npz: &mut NpzWriter<W>, name: &str, frame: &Frame) -> io::Result<()> {
    use SampleType::*;
    let shape = [frame.rows() as u64, frame.cols() as u64];
    let data = frame.row_major_iter();
    match frame.element_type() {
        F32 => write_array(npz, name, &shape, data.map(|x| x as f32)),
        F64 => write_array(npz, name, &shape, data),
        I8 => write_array(npz, name, &shape, data.map(|x| x as i8)),
        I16 => write_array(npz, name, &shape, data.map(|x| x as i16)),
        I32 => write_array(npz, name, &shape, data.map(|x| x as i32)),
        I64 => match frame.i64_samples() {
            Some(samples) => write_array(npz, name, &shape, samples.iter().copied()),
            None => write_array(npz, name, &shape, data.map(|x| x as i64)),
        },
        U8 => write_array(npz, name, &shape, data.map(|x| x as u8)),
        U16 => write_array(npz, name, &shape, data.map(|x| x as u16)),
        U32 => write_array(npz, name, &shape, data.map(|x| x as u32)),
        U64 => match frame.u64_samples() {
            Some(samples) => write_array(npz, name, &shape, samples.iter().copied()),
            None => write_array(npz, name, &shape, data.map(|x| x as u64)),
        },
    }
}

impl NpzStore {
    /// Opens an existing archive
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        log::info!("Loading {:?}...", path);
        let (archive, keys) = open_archive(&path)?;
        log::debug!("{} arrays in {:?}", keys.len(), path);
        Ok(Self {
            path,
            archive: Some(archive),
            keys,
        })
    }
    /// Creates an empty store that will be written to `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            archive: None,
            keys: Vec::new(),
        }
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    fn archive(&mut self) -> Result<&mut Archive> {
        let archive = match self.archive.take() {
            Some(archive) => archive,
            None => open_archive(&self.path)?.0,
        };
        Ok(self.archive.insert(archive))
    }
    /// Shape and element type of every array in the archive
    pub fn describe(&mut self) -> Result<Vec<ArrayInfo>> {
        let path = self.path.clone();
        let malformed = |e: io::Error| FrameError::Malformed {
            path: path.clone(),
            reason: e.to_string(),
        };
        let mut infos = Vec::with_capacity(self.keys.len());
        for key in self.keys.clone() {
            let npy = self
                .archive()?
                .by_name(&key)
                .map_err(malformed)?
                .ok_or_else(|| FrameError::MissingKey(key.clone()))?;
            infos.push(ArrayInfo {
                shape: npy.shape().to_vec(),
                dtype: npy.dtype().descr(),
                key,
            });
        }
        Ok(infos)
    }
}

impl FrameStore for NpzStore {
    fn keys(&self) -> Vec<String> {
        self.keys.clone()
    }
    fn fetch(&mut self, key: &str) -> Result<Frame> {
        let path = self.path.clone();
        let malformed = |reason: String| FrameError::Malformed {
            path: path.clone(),
            reason,
        };
        let npy = self
            .archive()?
            .by_name(key)
            .map_err(|e| malformed(e.to_string()))?
            .ok_or_else(|| FrameError::MissingKey(key.to_string()))?;
        let shape = npy.shape().to_vec();
        let (rows, cols) = match shape[..] {
            [rows, cols] => (rows as usize, cols as usize),
            _ => {
                return Err(malformed(format!(
                    "{key} has shape {shape:?}, a frame must have 2 dimensions"
                )))
            }
        };
        let sample_type = match npy.dtype() {
            DType::Plain(type_str) => SampleType::from_descr(&type_str.to_string()),
            _ => None,
        }
        .ok_or_else(|| malformed(format!("{key} has an unsupported element type")))?;
        read_frame(npy, rows, cols, sample_type).map_err(|e| malformed(format!("{key}: {e}")))
    }
    fn store(&mut self, frames: &[(String, Frame)]) -> Result<()> {
        let now = Instant::now();
        let io_err = |e| FrameError::Io(e, self.path.clone());
        // release the reader before overwriting the file
        self.archive = None;
        let mut npz = NpzWriter::create(&self.path).map_err(io_err)?;
        for (key, frame) in frames {
            write_frame(&mut npz, key, frame).map_err(io_err)?;
        }
        // writes the zip central directory
        let mut file = npz
            .zip_writer()
            .finish()
            .map_err(|e| io_err(e.into()))?;
        file.flush().map_err(io_err)?;
        self.keys = frames.iter().map(|(key, _)| key.clone()).collect();
        log::info!(
            "{} frames written to {:?} in {}ms",
            frames.len(),
            self.path,
            now.elapsed().as_millis()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::MemoryStore;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pcbro-{}-{}.npz", name, std::process::id()))
    }

    #[test]
    fn npz_store() {
        let path = scratch("store");
        let frames = vec![
            (
                "frame_gauss0_31".to_string(),
                Frame::from_row_slice(2, 3, &[1., 2., 3., 4., 5., 6.]).sample_type(SampleType::F32),
            ),
            (
                "channels_gauss0_31".to_string(),
                Frame::from_row_slice(1, 3, &[1., 2., 3.]).sample_type(SampleType::I32),
            ),
            (
                "frame_orig_7".to_string(),
                Frame::from_row_slice(3, 2, &[-1., 0., 1., -2., 0., 2.]).sample_type(SampleType::I16),
            ),
        ];
        NpzStore::create(&path).store(&frames).unwrap();

        let mut store = NpzStore::open(&path).unwrap();
        let mut keys = store.keys();
        keys.sort();
        assert_eq!(
            keys,
            vec!["channels_gauss0_31", "frame_gauss0_31", "frame_orig_7"]
        );
        let mut frame_keys = store.frame_keys();
        frame_keys.sort();
        assert_eq!(frame_keys, vec!["frame_gauss0_31", "frame_orig_7"]);
        for (key, frame) in &frames {
            assert_eq!(&store.fetch(key).unwrap(), frame);
        }
        let info = store
            .describe()
            .unwrap()
            .into_iter()
            .find(|info| info.key == "frame_orig_7")
            .unwrap();
        assert_eq!(info.shape, vec![3, 2]);
        assert!(info.dtype.contains("i2"));
        assert!(matches!(
            store.fetch("frame_gauss0_32"),
            Err(FrameError::MissingKey(_))
        ));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn exact_64bit_integers() {
        let path = scratch("int64");
        let big = (1i64 << 53) + 1;
        let frames = vec![
            ("frame_big_1".to_string(), Frame::from_i64(1, 2, vec![big, 1])),
            ("frame_big_2".to_string(), Frame::from_u64(2, 1, vec![u64::MAX, 0])),
        ];
        NpzStore::create(&path).store(&frames).unwrap();
        let mut store = NpzStore::open(&path).unwrap();
        let frame = store.fetch("frame_big_1").unwrap();
        assert_eq!(frame.i64_samples(), Some(&[big, 1][..]));
        // fetched and written back unmodified
        let copy = scratch("int64-copy");
        let kept = vec![("frame_big_1".to_string(), frame)];
        NpzStore::create(&copy).store(&kept).unwrap();
        let mut store = NpzStore::open(&copy).unwrap();
        assert_eq!(
            store.fetch("frame_big_1").unwrap().i64_samples(),
            Some(&[big, 1][..])
        );
        let mut store = NpzStore::open(&path).unwrap();
        assert_eq!(
            store.fetch("frame_big_2").unwrap().u64_samples(),
            Some(&[u64::MAX, 0][..])
        );
        std::fs::remove_file(&path).unwrap();
        std::fs::remove_file(&copy).unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn full_disk() {
        let frames = vec![(
            "frame_a_1".to_string(),
            Frame::from_row_slice(1, 2, &[1., 2.]),
        )];
        assert!(matches!(
            NpzStore::create("/dev/full").store(&[]),
            Err(FrameError::Io(..))
        ));
        assert!(matches!(
            NpzStore::create("/dev/full").store(&frames),
            Err(FrameError::Io(..))
        ));
    }

    #[test]
    fn empty_archive() {
        let path = scratch("empty");
        NpzStore::create(&path).store(&[]).unwrap();
        let store = NpzStore::open(&path).unwrap();
        assert!(store.keys().is_empty());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn one_dimensional_array_is_malformed() {
        let path = scratch("rank");
        {
            let mut npz = NpzWriter::create(&path).unwrap();
            write_array(&mut npz, "frame_bad_1", &[4], vec![1f64, 2., 3., 4.]).unwrap();
        }
        let mut store = NpzStore::open(&path).unwrap();
        assert!(matches!(
            store.fetch("frame_bad_1"),
            Err(FrameError::Malformed { .. })
        ));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_archive() {
        assert!(matches!(
            NpzStore::open(scratch("missing")),
            Err(FrameError::Io(..))
        ));
    }

    #[test]
    fn not_an_archive() {
        let path = scratch("text");
        std::fs::write(&path, "not a zip file").unwrap();
        assert!(matches!(
            NpzStore::open(&path),
            Err(FrameError::Malformed { .. })
        ));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn copy_between_stores() {
        let mut memory = MemoryStore::new();
        memory.insert("frame_a_1", Frame::from_row_slice(2, 2, &[1., 2., 3., 4.]));
        let path = scratch("copy");
        let mut npz = NpzStore::create(&path);
        let frames: Vec<_> = memory
            .keys()
            .into_iter()
            .map(|key| {
                let frame = memory.fetch(&key).unwrap();
                (key, frame)
            })
            .collect();
        npz.store(&frames).unwrap();
        assert_eq!(npz.fetch("frame_a_1").unwrap(), frames[0].1);
        std::fs::remove_file(&path).unwrap();
    }
}
