//! 1種目分の撮影セッション制御
//!
//! カメラ・レコーダ・認識・測定・監視を1つのフレームループに束ねる。
//! 外部デバイスはトレイト越しに扱い、テストではフェイクを差し込む。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{ensure, Context, Result};

use crate::calibration::PxPerCm;
use crate::config::Config;
use crate::integrity::{IntegrityMonitor, IntegrityReport, IntegrityStatus};
use crate::measure::{measure_for, FrameInput, TestId, TestKind, TestMeasure};
use crate::perception::{valid_persons, CapabilityTier, FramePerception, RgbFrame};

/// セッションの進行フェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    CameraActive,
    Recording,
    Finalizing,
    Completed,
    /// 単独受検ルール違反。再スタート以外の操作を受け付けない
    Violated,
}

/// フレーム供給元
pub trait CameraSource {
    fn resolution(&self) -> (u32, u32);
    fn read_frame(&mut self) -> Result<RgbFrame>;
    fn release(&mut self);
}

/// 録画・静止画の保存先
pub trait Recorder {
    fn start(&mut self, test: TestId, width: u32, height: u32) -> Result<()>;
    fn write_frame(&mut self, frame: &RgbFrame) -> Result<()>;
    /// 録画を確定しメディアのバイト列を返す
    fn stop(&mut self) -> Result<Vec<u8>>;
    fn is_recording(&self) -> bool;
    fn snapshot(&mut self, frame: &RgbFrame) -> Result<Vec<u8>>;
}

/// 確定した測定結果の受け口
pub trait ResultSink {
    fn submit(&mut self, completed: &CompletedTest) -> Result<()>;
}

/// 1種目分の確定結果
#[derive(Debug)]
pub struct CompletedTest {
    pub test: TestId,
    pub result: Option<f64>,
    pub unit: &'static str,
    pub kind: TestKind,
    pub media: Option<Vec<u8>>,
    pub integrity: IntegrityReport,
}

/// 録画開始からの経過秒の表示用カウンタ
///
/// 別スレッドで1秒単位に更新する。停止は `stop` で明示するか
/// Dropに任せる。
pub struct ElapsedTicker {
    secs: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ElapsedTicker {
    pub fn start() -> Self {
        let secs = Arc::new(AtomicU64::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let secs_clone = Arc::clone(&secs);
        let stop_clone = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            let started = Instant::now();
            while !stop_clone.load(Ordering::Relaxed) {
                secs_clone.store(started.elapsed().as_secs(), Ordering::Relaxed);
                thread::sleep(Duration::from_millis(100));
            }
        });
        Self {
            secs,
            stop,
            handle: Some(handle),
        }
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.secs.load(Ordering::Relaxed)
    }

    pub fn running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ElapsedTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 1種目分の撮影セッション
pub struct CaptureSession<C: CameraSource, R: Recorder, P: FramePerception> {
    test: TestId,
    config: Config,
    scale: Option<PxPerCm>,
    camera: Option<C>,
    recorder: R,
    perception: P,
    monitor: IntegrityMonitor,
    measure: Option<Box<dyn TestMeasure>>,
    ticker: Option<ElapsedTicker>,
    recording_started: Option<Instant>,
    stop_flag: Arc<AtomicBool>,
    media: Option<Vec<u8>>,
    phase: SessionPhase,
}

impl<C: CameraSource, R: Recorder, P: FramePerception> CaptureSession<C, R, P> {
    pub fn new(
        test: TestId,
        config: Config,
        recorder: R,
        perception: P,
        scale: Option<PxPerCm>,
    ) -> Self {
        let measure = measure_for(test, &config);
        Self {
            test,
            config,
            scale,
            camera: None,
            recorder,
            perception,
            monitor: IntegrityMonitor::new(),
            measure,
            ticker: None,
            recording_started: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
            media: None,
            phase: SessionPhase::Idle,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn test(&self) -> TestId {
        self.test
    }

    /// 外部から録画を止めるための停止フラグ
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.ticker.as_ref().map_or(0, |t| t.elapsed_secs())
    }

    pub fn reading(&self) -> Option<crate::measure::Reading> {
        self.measure.as_ref().map(|m| m.reading())
    }

    pub fn start_camera(&mut self, camera: C) -> Result<()> {
        ensure!(
            self.phase == SessionPhase::Idle,
            "Camera can only start from Idle (phase: {:?})",
            self.phase
        );
        self.camera = Some(camera);
        self.phase = SessionPhase::CameraActive;
        Ok(())
    }

    pub fn start_recording(&mut self) -> Result<()> {
        ensure!(
            self.phase == SessionPhase::CameraActive,
            "Recording requires an active camera (phase: {:?})",
            self.phase
        );
        let (width, height) = self
            .camera
            .as_ref()
            .context("Camera missing")?
            .resolution();
        self.recorder.start(self.test, width, height)?;
        if let Some(measure) = self.measure.as_mut() {
            measure.on_recording_start();
        }
        self.ticker = Some(ElapsedTicker::start());
        self.recording_started = Some(Instant::now());
        self.stop_flag.store(false, Ordering::Relaxed);
        self.phase = SessionPhase::Recording;
        Ok(())
    }

    /// 録画中の1フレーム分を処理する
    ///
    /// 処理順: 取得 → 認識 → 監視 → 測定 → 録画。
    pub fn process_frame(&mut self) -> Result<()> {
        ensure!(
            self.phase == SessionPhase::Recording,
            "Not recording (phase: {:?})",
            self.phase
        );
        let frame = self
            .camera
            .as_mut()
            .context("Camera missing")?
            .read_frame()?;
        let elapsed = self
            .recording_started
            .map_or(Duration::ZERO, |s| s.elapsed());

        let detections = self.perception.detect(&frame)?;
        let persons = valid_persons(&detections, self.config.perception.person_score_threshold);
        if self.monitor.observe(&persons) == IntegrityStatus::Violated {
            println!("単独受検ルール違反を検出。測定を無効化します");
            self.trigger_violation();
            return Ok(());
        }

        let pose = if self.test.tier() >= CapabilityTier::DetectorAndPose {
            self.perception.estimate_pose(&frame)?
        } else {
            None
        };

        if let Some(measure) = self.measure.as_mut() {
            let input = FrameInput {
                elapsed,
                width: frame.width,
                height: frame.height,
                persons: &persons,
                pose: pose.as_ref(),
                pixels: Some(&frame),
            };
            measure.update(&input, self.scale);
        }

        self.recorder.write_frame(&frame)?;

        // 終了条件を持つ種目（シャトルランなど）は自動停止
        if self.measure.as_ref().is_some_and(|m| m.finished()) {
            self.stop_recording()?;
        }
        Ok(())
    }

    /// 停止フラグ・違反・種目の終了条件まで回すフレームループ
    ///
    /// フレーム単位の失敗はログに出して続行する。
    pub fn run(&mut self) -> Result<()> {
        while self.phase == SessionPhase::Recording {
            if self.stop_flag.load(Ordering::Relaxed) {
                self.stop_recording()?;
                break;
            }
            if let Err(e) = self.process_frame() {
                eprintln!("フレーム処理をスキップ: {}", e);
            }
        }
        Ok(())
    }

    /// 静止画種目（身長）: 1フレーム測定してスナップショットを確定する
    pub fn capture_still(&mut self) -> Result<()> {
        ensure!(
            self.phase == SessionPhase::CameraActive,
            "Still capture requires an active camera (phase: {:?})",
            self.phase
        );
        let frame = self
            .camera
            .as_mut()
            .context("Camera missing")?
            .read_frame()?;
        let detections = self.perception.detect(&frame)?;
        let persons = valid_persons(&detections, self.config.perception.person_score_threshold);
        if self.monitor.observe(&persons) == IntegrityStatus::Violated {
            println!("単独受検ルール違反を検出。測定を無効化します");
            self.trigger_violation();
            return Ok(());
        }
        if let Some(measure) = self.measure.as_mut() {
            let input = FrameInput {
                elapsed: Duration::ZERO,
                width: frame.width,
                height: frame.height,
                persons: &persons,
                pose: None,
                pixels: Some(&frame),
            };
            measure.update(&input, self.scale);
        }
        self.media = Some(self.recorder.snapshot(&frame)?);
        self.phase = SessionPhase::Finalizing;
        Ok(())
    }

    pub fn stop_recording(&mut self) -> Result<()> {
        ensure!(
            self.phase == SessionPhase::Recording,
            "Not recording (phase: {:?})",
            self.phase
        );
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.stop();
        }
        self.media = Some(self.recorder.stop()?);
        self.phase = SessionPhase::Finalizing;
        Ok(())
    }

    /// 違反確定。レコーダ停止はベストエフォート、カメラは必ず解放する
    pub fn trigger_violation(&mut self) {
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.stop();
        }
        if self.recorder.is_recording() {
            if let Err(e) = self.recorder.stop() {
                eprintln!("違反時のレコーダ停止に失敗: {}", e);
            }
        }
        self.release_camera();
        self.phase = SessionPhase::Violated;
    }

    /// 確定結果をシンクへ渡してセッションを閉じる
    pub fn finalize(&mut self, sink: &mut dyn ResultSink) -> Result<CompletedTest> {
        ensure!(
            self.phase == SessionPhase::Finalizing,
            "Nothing to finalize (phase: {:?})",
            self.phase
        );
        let result = self.measure.as_ref().and_then(|m| m.reading().value());
        let completed = CompletedTest {
            test: self.test,
            result,
            unit: self.test.unit(),
            kind: self.test.kind(),
            media: self.media.take(),
            integrity: self.monitor.report(),
        };
        sink.submit(&completed)?;
        self.release_camera();
        self.phase = SessionPhase::Completed;
        Ok(completed)
    }

    /// 次の種目の設定を引いたままセッションを畳む
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn release_camera(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            camera.release();
        }
    }
}

impl<C: CameraSource, R: Recorder, P: FramePerception> Drop for CaptureSession<C, R, P> {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.stop();
        }
        self.release_camera();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::{BBox, Detection, Pose};

    struct FakeCamera {
        frames: Vec<RgbFrame>,
        released: Arc<AtomicBool>,
    }

    impl FakeCamera {
        fn new(frame_count: usize) -> (Self, Arc<AtomicBool>) {
            let released = Arc::new(AtomicBool::new(false));
            let camera = Self {
                frames: (0..frame_count).map(|_| RgbFrame::black(64, 48)).collect(),
                released: Arc::clone(&released),
            };
            (camera, released)
        }
    }

    impl CameraSource for FakeCamera {
        fn resolution(&self) -> (u32, u32) {
            (64, 48)
        }

        fn read_frame(&mut self) -> Result<RgbFrame> {
            self.frames.pop().context("No more frames")
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::Relaxed);
        }
    }

    #[derive(Default)]
    struct FakeRecorder {
        recording: bool,
        frames_written: usize,
    }

    impl Recorder for FakeRecorder {
        fn start(&mut self, _test: TestId, _width: u32, _height: u32) -> Result<()> {
            self.recording = true;
            Ok(())
        }

        fn write_frame(&mut self, _frame: &RgbFrame) -> Result<()> {
            self.frames_written += 1;
            Ok(())
        }

        fn stop(&mut self) -> Result<Vec<u8>> {
            self.recording = false;
            Ok(vec![1, 2, 3])
        }

        fn is_recording(&self) -> bool {
            self.recording
        }

        fn snapshot(&mut self, _frame: &RgbFrame) -> Result<Vec<u8>> {
            Ok(vec![9])
        }
    }

    /// フレームごとに用意した検出結果を順に返すフェイク
    struct ScriptedPerception {
        script: Vec<Vec<Detection>>,
        cursor: usize,
    }

    impl ScriptedPerception {
        fn new(script: Vec<Vec<Detection>>) -> Self {
            Self { script, cursor: 0 }
        }
    }

    impl FramePerception for ScriptedPerception {
        fn detect(&mut self, _frame: &RgbFrame) -> Result<Vec<Detection>> {
            let persons = self
                .script
                .get(self.cursor)
                .cloned()
                .unwrap_or_default();
            self.cursor += 1;
            Ok(persons)
        }

        fn estimate_pose(&mut self, _frame: &RgbFrame) -> Result<Option<Pose>> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct VecSink {
        submitted: Vec<(TestId, Option<f64>, bool)>,
    }

    impl ResultSink for VecSink {
        fn submit(&mut self, completed: &CompletedTest) -> Result<()> {
            self.submitted
                .push((completed.test, completed.result, completed.integrity.violated));
            Ok(())
        }
    }

    fn person_at(cx: f32) -> Detection {
        Detection::person(
            0.9,
            BBox {
                x: cx - 5.0,
                y: 10.0,
                width: 10.0,
                height: 30.0,
            },
        )
    }

    #[test]
    fn test_recording_flow_submits_result() {
        let (camera, released) = FakeCamera::new(10);
        // 30m走: スタート線(20%=12.8px)→ゴール線(80%=51.2px)を通過
        let script = vec![
            vec![person_at(5.0)],
            vec![person_at(20.0)],
            vec![person_at(40.0)],
            vec![person_at(60.0)],
        ];
        let mut session = CaptureSession::new(
            TestId::Sprint,
            Config::default(),
            FakeRecorder::default(),
            ScriptedPerception::new(script),
            None,
        );
        session.start_camera(camera).unwrap();
        session.start_recording().unwrap();
        session.run().unwrap();

        // ゴール通過で自動停止している
        assert_eq!(session.phase(), SessionPhase::Finalizing);
        let mut sink = VecSink::default();
        let completed = session.finalize(&mut sink).unwrap();
        assert_eq!(completed.test, TestId::Sprint);
        assert!(completed.result.is_some());
        assert!(completed.media.is_some());
        assert!(!completed.integrity.violated);
        assert_eq!(sink.submitted.len(), 1);
        assert!(released.load(Ordering::Relaxed));
        assert_eq!(session.phase(), SessionPhase::Completed);
    }

    #[test]
    fn test_violation_stops_everything() {
        let (camera, released) = FakeCamera::new(10);
        let script = vec![
            vec![person_at(20.0)],
            vec![person_at(20.0), person_at(50.0)],
        ];
        let mut session = CaptureSession::new(
            TestId::Sprint,
            Config::default(),
            FakeRecorder::default(),
            ScriptedPerception::new(script),
            None,
        );
        session.start_camera(camera).unwrap();
        session.start_recording().unwrap();
        session.process_frame().unwrap();
        assert_eq!(session.phase(), SessionPhase::Recording);
        session.process_frame().unwrap();

        assert_eq!(session.phase(), SessionPhase::Violated);
        assert!(released.load(Ordering::Relaxed));
        // 違反後は一切の操作を受け付けない
        assert!(session.process_frame().is_err());
        assert!(session.stop_recording().is_err());
        let mut sink = VecSink::default();
        assert!(session.finalize(&mut sink).is_err());
    }

    #[test]
    fn test_drop_releases_camera_mid_recording() {
        let (camera, released) = FakeCamera::new(10);
        {
            let mut session = CaptureSession::new(
                TestId::Sprint,
                Config::default(),
                FakeRecorder::default(),
                ScriptedPerception::new(vec![]),
                None,
            );
            session.start_camera(camera).unwrap();
            session.start_recording().unwrap();
            // 停止せずにセッションを破棄する
        }
        assert!(released.load(Ordering::Relaxed));
    }

    #[test]
    fn test_stop_flag_ends_the_loop() {
        let (camera, _released) = FakeCamera::new(1000);
        let mut session = CaptureSession::new(
            TestId::EnduranceRun,
            Config::default(),
            FakeRecorder::default(),
            ScriptedPerception::new(vec![]),
            None,
        );
        session.start_camera(camera).unwrap();
        session.start_recording().unwrap();
        session.stop_handle().store(true, Ordering::Relaxed);
        session.run().unwrap();
        assert_eq!(session.phase(), SessionPhase::Finalizing);
    }

    #[test]
    fn test_still_capture_for_height() {
        let (camera, released) = FakeCamera::new(3);
        let script = vec![vec![Detection::person(
            0.9,
            BBox {
                x: 10.0,
                y: 2.0,
                width: 12.0,
                height: 40.0,
            },
        )]];
        let mut session = CaptureSession::new(
            TestId::Height,
            Config::default(),
            FakeRecorder::default(),
            ScriptedPerception::new(script),
            PxPerCm::new(0.25),
        );
        session.start_camera(camera).unwrap();
        session.capture_still().unwrap();
        assert_eq!(session.phase(), SessionPhase::Finalizing);

        let mut sink = VecSink::default();
        let completed = session.finalize(&mut sink).unwrap();
        // 40px / 0.25 = 160cm
        assert_eq!(completed.result, Some(160.0));
        assert_eq!(completed.media, Some(vec![9]));
        assert!(released.load(Ordering::Relaxed));
    }

    #[test]
    fn test_elapsed_ticker_stops() {
        let mut ticker = ElapsedTicker::start();
        assert!(ticker.running());
        ticker.stop();
        assert!(!ticker.running());
    }
}
