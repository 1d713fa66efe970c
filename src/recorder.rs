//! 録画・静止画の書き出し（OpenCV VideoWriter）

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{ensure, Context, Result};
use opencv::{
    core::{Size, Vector},
    imgcodecs,
    prelude::*,
    videoio::{VideoWriter, VideoWriterTrait},
};

use crate::config::SessionConfig;
use crate::measure::TestId;
use crate::perception::RgbFrame;
use crate::session::Recorder;

/// 種目ごとにmp4ファイルを書き出すレコーダ
///
/// stop時にファイルを閉じ、そのバイト列を結果添付用に読み戻す。
/// ファイル自体も record_dir に残る。
pub struct VideoFileRecorder {
    record_dir: PathBuf,
    fps: f64,
    writer: Option<VideoWriter>,
    current_path: Option<PathBuf>,
}

impl VideoFileRecorder {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let record_dir = PathBuf::from(&config.record_dir);
        fs::create_dir_all(&record_dir).context("Failed to create record directory")?;
        Ok(Self {
            record_dir,
            fps: config.record_fps,
            writer: None,
            current_path: None,
        })
    }

    fn output_path(&self, test: TestId) -> PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.record_dir
            .join(format!("{}_{}.mp4", test.as_str(), stamp))
    }
}

impl Recorder for VideoFileRecorder {
    fn start(&mut self, test: TestId, width: u32, height: u32) -> Result<()> {
        ensure!(self.writer.is_none(), "Recorder already running");
        let path = self.output_path(test);
        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
        let writer = VideoWriter::new(
            path.to_string_lossy().as_ref(),
            fourcc,
            self.fps,
            Size::new(width as i32, height as i32),
            true,
        )
        .context("Failed to open video writer")?;
        ensure!(writer.is_opened()?, "Video writer did not open");
        println!("録画開始: {}", path.display());
        self.writer = Some(writer);
        self.current_path = Some(path);
        Ok(())
    }

    fn write_frame(&mut self, frame: &RgbFrame) -> Result<()> {
        let writer = self.writer.as_mut().context("Recorder not running")?;
        let bgr = frame.to_bgr_mat()?;
        writer.write(&bgr)?;
        Ok(())
    }

    fn stop(&mut self) -> Result<Vec<u8>> {
        let mut writer = self.writer.take().context("Recorder not running")?;
        writer.release()?;
        let path = self.current_path.take().context("No recording path")?;
        println!("録画終了: {}", path.display());
        fs::read(&path).context("Failed to read recorded file")
    }

    fn is_recording(&self) -> bool {
        self.writer.is_some()
    }

    fn snapshot(&mut self, frame: &RgbFrame) -> Result<Vec<u8>> {
        let bgr = frame.to_bgr_mat()?;
        let mut buf = Vector::<u8>::new();
        let params = Vector::<i32>::new();
        imgcodecs::imencode(".png", &bgr, &mut buf, &params)?;
        Ok(buf.to_vec())
    }
}
