use argh::FromArgs;
use rand::{rngs::StdRng, SeedableRng};
use std::path::PathBuf;

use iaicp::{IaIcp, IaIcpConfig};
use iaicp_3d::{
    camera::PinholeCamera,
    synthetic::WavySurface,
    transforms::{pose_to_transform, transform_to_pose, RigidTransform},
};

#[derive(FromArgs)]
/// Registers two synthetic frames of a textured surface with intensity-assisted ICP
struct Args {
    /// path to a JSON camera file
    #[argh(option)]
    camera_path: Option<PathBuf>,

    /// path to a JSON registration config file
    #[argh(option)]
    config_path: Option<PathBuf>,

    /// target camera translation along x in meters
    #[argh(option, default = "0.03")]
    tx: f64,

    /// target camera translation along y in meters
    #[argh(option, default = "-0.02")]
    ty: f64,

    /// target camera translation along z in meters
    #[argh(option, default = "0.02")]
    tz: f64,

    /// target camera roll in radians
    #[argh(option, default = "0.01")]
    roll: f64,

    /// target camera pitch in radians
    #[argh(option, default = "-0.015")]
    pitch: f64,

    /// target camera yaw in radians
    #[argh(option, default = "0.02")]
    yaw: f64,

    /// seed of the random generator
    #[argh(option, default = "0")]
    seed: u64,

    /// start from the true motion instead of the identity
    #[argh(switch)]
    with_prediction: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let camera = match &args.camera_path {
        Some(path) => serde_json::from_reader(std::fs::File::open(path)?)?,
        None => PinholeCamera::new(525.0, 525.0, 319.5, 239.5, 640, 480),
    };
    let config = match &args.config_path {
        Some(path) => serde_json::from_reader(std::fs::File::open(path)?)?,
        None => IaIcpConfig::default(),
    };

    let surface = WavySurface::default();
    let world_from_target =
        pose_to_transform(&[args.tx, args.ty, args.tz, args.roll, args.pitch, args.yaw]);
    let truth = world_from_target.inverse();

    let source = surface.render(&camera, &RigidTransform::identity())?;
    let target = surface.render(&camera, &world_from_target)?;
    println!("Frames: {}x{}", camera.width, camera.height);

    let mut icp = IaIcp::new(camera, config);
    icp.setup_source(source)?;
    icp.setup_target(target)?;
    if args.with_prediction {
        icp.setup_predict(truth);
    }

    let mut rng = StdRng::seed_from_u64(args.seed);
    let now = std::time::Instant::now();
    let result = icp.run_with_rng(&mut rng)?;
    log::info!("elapsed: {:?}", now.elapsed());

    println!(
        "Salient points: #{} (fallback: {})",
        icp.salient_source().len(),
        result.used_fallback
    );
    for report in result.reports.iter().filter(|r| r.skipped) {
        println!("Skipped level {} iteration {}", report.level, report.iteration);
    }

    let error = result.transform.compose(&truth.inverse());
    println!("True pose:      {:?}", transform_to_pose(&truth));
    println!("Estimated pose: {:?}", transform_to_pose(&result.transform));
    println!(
        "Error: translation {:.5} m, rotation {:.5} rad",
        error.translation_norm(),
        error.rotation_angle()
    );

    let salient = icp.salient_source().points();
    if !salient.is_empty() {
        let misalignment = salient
            .iter()
            .map(|p| {
                result
                    .transform
                    .transform_point(p.xyz)
                    .distance(truth.transform_point(p.xyz))
            })
            .sum::<f64>()
            / salient.len() as f64;
        println!("Mean salient point misalignment: {:.5} m", misalignment);
    }

    Ok(())
}
