use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use taisoku::calibration::{load_scale, PxPerCm};
use taisoku::camera::OpenCvCamera;
use taisoku::config::Config;
use taisoku::integrity::IntegrityMonitor;
use taisoku::measure::{next_step, parse_manual_value, NextStep, TestId, TestKind};
use taisoku::perception::PerceptionStack;
use taisoku::recorder::VideoFileRecorder;
use taisoku::session::{CaptureSession, CompletedTest, ResultSink, SessionPhase};

const CONFIG_PATH: &str = "config.toml";

/// 結果をJSONとメディアファイルで書き出すシンク
struct JsonFileSink {
    out_dir: PathBuf,
}

#[derive(Serialize)]
struct ResultRecord<'a> {
    test: &'a str,
    name: &'a str,
    result: Option<f64>,
    unit: &'a str,
    violated: bool,
    max_person_count: usize,
    media_path: Option<String>,
}

impl JsonFileSink {
    fn new(out_dir: &str) -> Result<Self> {
        let out_dir = PathBuf::from(out_dir);
        fs::create_dir_all(&out_dir).context("Failed to create output directory")?;
        Ok(Self { out_dir })
    }
}

impl ResultSink for JsonFileSink {
    fn submit(&mut self, completed: &CompletedTest) -> Result<()> {
        let media_path = match &completed.media {
            Some(bytes) => {
                let ext = match completed.test {
                    TestId::Height => "png",
                    _ => "mp4",
                };
                let path = self.out_dir.join(format!("{}.{}", completed.test.as_str(), ext));
                fs::write(&path, bytes).context("Failed to write media file")?;
                Some(path.to_string_lossy().into_owned())
            }
            None => None,
        };

        let record = ResultRecord {
            test: completed.test.as_str(),
            name: completed.test.name(),
            result: completed.result,
            unit: completed.unit,
            violated: completed.integrity.violated,
            max_person_count: completed.integrity.max_person_count,
            media_path,
        };
        let path = self
            .out_dir
            .join(format!("{}.json", completed.test.as_str()));
        let json = serde_json::to_string_pretty(&record)?;
        fs::write(&path, json).context("Failed to write result file")?;
        println!("結果を保存: {}", path.display());
        Ok(())
    }
}

fn prompt_enter(message: &str) -> Result<()> {
    print!("{} > ", message);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(())
}

fn run_manual_test(test: TestId, sink: &mut JsonFileSink) -> Result<()> {
    let value = loop {
        print!("{}を入力 ({}) > ", test.name(), test.unit());
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        match parse_manual_value(&line) {
            Ok(v) => break v,
            Err(e) => println!("{}", e),
        }
    };
    let completed = CompletedTest {
        test,
        result: Some(value),
        unit: test.unit(),
        kind: TestKind::Input,
        media: None,
        integrity: IntegrityMonitor::new().report(),
    };
    sink.submit(&completed)?;
    Ok(())
}

/// カメラ種目を1つ実施する。違反で終わった場合true
fn run_camera_test(
    test: TestId,
    config: &Config,
    scale: Option<PxPerCm>,
    stack: &mut PerceptionStack,
    sink: &mut JsonFileSink,
) -> Result<bool> {
    stack.ensure_loaded(test.tier())?;
    let camera = OpenCvCamera::open_for(test.facing(), &config.session)?;
    let recorder = VideoFileRecorder::new(&config.session)?;
    let mut session = CaptureSession::new(test, config.clone(), recorder, &mut *stack, scale);
    session.start_camera(camera)?;

    if test == TestId::Height {
        prompt_enter("被検者の全身が映ったらEnterで撮影")?;
        session.capture_still()?;
    } else {
        prompt_enter("準備ができたらEnterで録画開始")?;
        session.start_recording()?;
        let stop = session.stop_handle();
        thread::spawn(move || {
            let mut line = String::new();
            let _ = io::stdin().read_line(&mut line);
            stop.store(true, Ordering::Relaxed);
        });
        println!("録画中。Enterで停止");
        session.run()?;
    }

    match session.phase() {
        SessionPhase::Finalizing => {
            let completed = session.finalize(sink)?;
            match completed.result {
                Some(v) => println!("結果: {} {}", v, completed.unit),
                None => println!("結果を数値化できませんでした"),
            }
            Ok(false)
        }
        SessionPhase::Violated => Ok(true),
        phase => bail!("想定外のフェーズで終了: {:?}", phase),
    }
}

fn run_break(secs: u64) {
    println!("休憩: {}分{}秒", secs / 60, secs % 60);
    let mut remaining = secs;
    while remaining > 0 {
        let step = remaining.min(60);
        thread::sleep(Duration::from_secs(step));
        remaining -= step;
        if remaining > 0 {
            println!("残り {}分{}秒", remaining / 60, remaining % 60);
        }
    }
    println!("休憩終了。次の種目へ");
}

fn main() -> Result<()> {
    println!("=== 体力テスト測定ステーション ({}) ===", env!("GIT_VERSION"));

    let config = Config::load_or_default(CONFIG_PATH);
    let scale = load_scale(&config.calibration.scale_path)
        .ok()
        .and_then(|s| s.scale());
    match scale {
        Some(s) => println!("キャリブレーション済み: {:.2} px/cm", s.value()),
        None => println!("キャリブレーション未取得。実寸系の種目は数値が出ません"),
    }

    // Usage: measure_station [test_id]  途中の種目から再開できる
    let mut current = match std::env::args().nth(1) {
        Some(arg) => TestId::from_str(&arg).with_context(|| format!("不明な種目: {}", arg))?,
        None => TestId::Height,
    };

    let mut stack = PerceptionStack::new(config.perception.clone());
    let mut sink = JsonFileSink::new(&config.session.record_dir)?;

    loop {
        println!();
        println!("--- {} ({}) ---", current.name(), current.unit());

        let violated = match current.kind() {
            TestKind::Input => {
                run_manual_test(current, &mut sink)?;
                false
            }
            TestKind::Video => run_camera_test(current, &config, scale, &mut stack, &mut sink)?,
        };
        if violated {
            bail!("単独受検ルール違反のため測定を中断しました。再スタートしてください");
        }

        match next_step(current, &config.session) {
            NextStep::Test(next) => current = next,
            NextStep::Break { secs, then } => {
                run_break(secs);
                current = then;
            }
            NextStep::Done => {
                println!("全種目が完了しました");
                break;
            }
        }
    }
    Ok(())
}
