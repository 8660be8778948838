use halo_heat::algs::communicator::LocalComm;
use halo_heat::config::RunConfig;
use halo_heat::heat_error::ErrorKind;
use halo_heat::io::{FieldLoader, Palette, PngField};
use halo_heat::sim::run_rank;
use std::path::PathBuf;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("halo-heat-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

#[test]
fn json_config_loads_with_defaults() {
    let path = scratch("run.json");
    std::fs::write(
        &path,
        r#"{ "dimx": 4, "dimy": 2, "iterations": 10, "input": "heat.png", "center_weight": 0.6 }"#,
    )
    .unwrap();
    let cfg = RunConfig::from_json_file(&path).unwrap();
    assert_eq!(cfg.dims(), [4, 2]);
    assert_eq!(cfg.iterations, 10);
    assert_eq!(cfg.output, PathBuf::from("heatsim.png"));
    assert!((cfg.kernel().unwrap().neighbor_weight() - 0.1).abs() < 1e-15);
    cfg.validate(8).unwrap();
}

#[test]
fn malformed_config_is_an_io_error() {
    let path = scratch("broken.json");
    std::fs::write(&path, "{ dimx: ").unwrap();
    let err = RunConfig::from_json_file(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    let err = RunConfig::from_json_file(&scratch("missing.json")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn png_in_png_out() {
    let input = scratch("source.png");
    let output = scratch("result.png");
    let mut img = image::RgbImage::new(4, 3);
    img.put_pixel(1, 1, image::Rgb([255, 0, 0]));
    // green and blue carry no heat
    img.put_pixel(3, 2, image::Rgb([0, 255, 255]));
    img.save(&input).unwrap();

    let cfg = RunConfig {
        input: Some(input.clone()),
        output: output.clone(),
        iterations: 0,
        palette: Palette::Gray,
        ..RunConfig::default()
    };
    let png = PngField {
        palette: cfg.palette,
        ..PngField::default()
    };
    let comm = LocalComm::universe(1).remove(0);
    let summary = run_rank(&comm, &cfg, &png, &png).unwrap();
    let field = summary.field.unwrap();
    assert_eq!(field.get(1, 1), 1000.0);
    assert_eq!(field.get(3, 2), 0.0);

    let back = png.load(&output).unwrap();
    assert_eq!(back.shape(), (4, 3));
    assert_eq!(back.get(1, 1), 1.0);
    assert_eq!(back.get(0, 0), 0.0);
}
