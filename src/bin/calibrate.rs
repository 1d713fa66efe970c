use anyhow::{Context, Result};

use taisoku::calibration::{detect_a4_scale, save_scale, StoredScale};
use taisoku::config::Config;
use taisoku::session::CameraSource;

const CONFIG_PATH: &str = "config.toml";

/// A4用紙によるスケールキャリブレーション
///
/// Usage: calibrate [camera_index]
fn main() -> Result<()> {
    println!("=== A4キャリブレーション ({}) ===", env!("GIT_VERSION"));

    let config = Config::load_or_default(CONFIG_PATH);
    let index = match std::env::args().nth(1) {
        Some(arg) => arg.parse().context("カメラ番号は整数で指定してください")?,
        None => config.session.front_camera_index,
    };

    let mut camera = taisoku::camera::OpenCvCamera::open_with_resolution(
        index,
        config.session.camera_width,
        config.session.camera_height,
    )?;

    println!("A4用紙をカメラ正面にかざしてください");

    // 露出が安定するまで数フレーム捨てる
    for _ in 0..10 {
        let _ = camera.read_frame();
    }

    let result: Result<()> = (|| {
        let frame = camera.read_frame()?;
        let scale = detect_a4_scale(&frame, &config.calibration)?;
        let stored = StoredScale::new(scale, frame.width, frame.height);
        save_scale(&config.calibration.scale_path, &stored)?;
        println!(
            "スケール確定: {:.2} px/cm ({}x{}) → {}",
            scale.value(),
            frame.width,
            frame.height,
            config.calibration.scale_path
        );
        Ok(())
    })();

    camera.release();
    result
}
