//! Prints the content of an intrinsic record and optionally re-saves it.
//!
//! ```text
//! cargo run --example inspect_intrinsics -- --input samples/brown.yaml --output output/brown.yaml
//! ```

use clap::Parser;
use log::info;
use nalgebra::Vector2;
use sfm_intrinsics::camera::{load_intrinsics_from_json, CameraModel, CameraModelEnum};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Inspect camera intrinsic records", long_about = None)]
struct Args {
    /// YAML record, or a JSON document with an `intrinsics` list
    #[arg(short, long)]
    input: PathBuf,

    /// Write the first intrinsic back as YAML
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pixel error (in pixels) to express on the camera plane
    #[arg(long, default_value_t = 1.0)]
    pixel_error: f64,
}

fn describe(model: &CameraModelEnum, pixel_error: f64) {
    println!("type:            {}", model.get_type());
    println!("size:            {}x{}", model.width(), model.height());
    println!("serial number:   {:?}", model.serial_number());
    println!("initial focal:   {}", model.initial_focal_length_pix());
    println!("params:          {:?}", model.get_params());
    println!("valid:           {}", model.is_valid());
    println!("hash:            {:016x}", model.hash_value());
    println!(
        "{pixel_error} px error:   {:.3e} on the camera plane",
        model.image_plane_to_camera_plane_error(pixel_error)
    );

    let corner = Vector2::new(0.0, 0.0);
    let undistorted = model.get_ud_pixel(&corner);
    println!(
        "corner (0, 0):   undistorted to ({:.3}, {:.3})",
        undistorted.x, undistorted.y
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let is_json = args
        .input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let models = if is_json {
        load_intrinsics_from_json(&args.input)?
    } else {
        vec![CameraModelEnum::load_from_yaml(&args.input)?]
    };

    for (i, model) in models.iter().enumerate() {
        println!("--- intrinsic {i}");
        describe(model, args.pixel_error);
    }

    let groups = {
        let mut hashes: Vec<u64> = models.iter().map(|m| m.hash_value()).collect();
        hashes.sort_unstable();
        hashes.dedup();
        hashes.len()
    };
    info!("{} intrinsics in {} distinct groups", models.len(), groups);

    if let (Some(output), Some(first)) = (args.output, models.first()) {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        first.save_to_yaml(&output)?;
        println!("saved {}", output.display());
    }

    Ok(())
}
