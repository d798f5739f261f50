//! End-to-end runs of the detectors and the assistant on drawn frames

use aim_capture::SyntheticBuffCamera;
use aim_core::{AimMethod, Arm, ArmorLabel, Direction, Point2, Rfid, Team};
use aim_cv::{AimAssistant, AimConfig, BuffDetector, Detector, Frame, ImageOracle, OpenCvOracle, OverlayRenderer, ParamPaths};
use approx::assert_relative_eq;
use image::Rgb;

const GLOW: Rgb<u8> = Rgb([255, 0, 0]);

fn paint(frame: &mut Frame, x0: u32, y0: u32, w: u32, h: u32) {
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            frame.put_pixel(x, y, GLOW);
        }
    }
}

/// Buff with its rotation center in the middle, four plates around it and
/// the hammer next to the top plate
fn buff_frame() -> Frame {
    let mut frame = Frame::new(640, 480);
    // Rotation center
    paint(&mut frame, 310, 230, 20, 20);
    // Plates centered at (320, 90), (470, 240), (320, 390), (170, 240)
    paint(&mut frame, 295, 70, 50, 40);
    paint(&mut frame, 445, 220, 50, 40);
    paint(&mut frame, 295, 370, 50, 40);
    paint(&mut frame, 145, 220, 50, 40);
    // Hammer: an L spanning x 380..500, y 40..140
    paint(&mut frame, 380, 40, 120, 30);
    paint(&mut frame, 380, 40, 30, 100);
    frame
}

/// First `count` frames of a buff spinning at 60 deg/s
fn rotating_frames(direction: Direction, count: u64) -> Vec<Frame> {
    let camera = SyntheticBuffCamera::new(640, 480, GLOW).with_rotation(direction, 60.0);
    (0..count).map(|i| camera.render(i)).collect()
}

fn near(p: Point2, x: f64, y: f64) -> bool {
    (p.x - x).abs() < 2.0 && (p.y - y).abs() < 2.0
}

#[test]
fn test_buff_frame_is_detected() {
    let mut detector = BuffDetector::new(Team::Red);
    let buffs = detector.detect(&buff_frame()).unwrap();

    assert_eq!(buffs.len(), 1);
    let buff = &buffs[0];
    assert_eq!(buff.armors().len(), 4);
    assert!(near(buff.center(), 320.0, 240.0), "center {:?}", buff.center());
    assert!(near(buff.target().center(), 320.0, 90.0), "target {:?}", buff.target().center());
    assert!(buff.hammer().area() > 0.0);
}

#[test]
fn test_detect_is_repeatable() {
    let mut detector = BuffDetector::new(Team::Red);
    let mut frames = rotating_frames(Direction::CounterClockwise, 3);
    frames.push(buff_frame());

    for frame in &frames {
        let first = detector.detect(frame).unwrap();
        let second = detector.detect(frame).unwrap();
        assert_eq!(first, second);
        assert!(!first[0].target().is_empty());
    }
}

#[test]
fn test_buff_frame_of_other_team_is_empty() {
    let mut detector = BuffDetector::new(Team::Blue);
    let buffs = detector.detect(&buff_frame()).unwrap();
    assert!(buffs[0].armors().is_empty());
    assert!(buffs[0].target().is_empty());
}

#[test]
fn test_black_frame_yields_nothing() {
    let mut detector = BuffDetector::new(Team::Red);
    let buffs = detector.detect(&Frame::new(640, 480)).unwrap();
    assert!(buffs[0].armors().is_empty());
    assert!(buffs[0].center().is_origin());
}

#[test]
fn test_still_buff_never_predicts() {
    let mut assistant = AimAssistant::new(Arm::Infantry);
    assistant.set_enemy_team(Team::Red);
    assistant.set_rfid(Rfid::Buff);
    assert_eq!(assistant.method(), AimMethod::Buff);

    let frame = buff_frame();
    for _ in 0..6 {
        let out = assistant.aim(&frame).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].is_empty());
    }
    assert_eq!(assistant.buff_predictor().direction(), Direction::Unknown);
    assert!(!assistant.visualize_result(11).is_empty());
}

/// Aim at every frame, checking each prediction is the target rotated about
/// the buff center. Returns how many frames produced a prediction.
fn aim_rotating(assistant: &mut AimAssistant, frames: &[Frame]) -> usize {
    let mut predicted = 0;
    for frame in frames {
        let out = assistant.aim(frame).unwrap();
        assert_eq!(out.len(), 1);
        if out[0].is_empty() {
            continue;
        }
        predicted += 1;

        let buff = assistant.buff_predictor().buff();
        let center = buff.center();
        let target = buff.target().center();
        assert_relative_eq!(
            out[0].center().distance_to(&center),
            target.distance_to(&center),
            epsilon = 1e-3
        );
        assert!(out[0].center().distance_to(&target) > 1.0);
    }
    predicted
}

#[test]
fn test_rotating_buff_is_predicted() {
    let mut assistant = AimAssistant::new(Arm::Infantry);
    assistant.set_enemy_team(Team::Red);
    assistant.set_rfid(Rfid::Buff);

    let predicted = aim_rotating(&mut assistant, &rotating_frames(Direction::CounterClockwise, 12));
    assert_eq!(assistant.buff_predictor().direction(), Direction::CounterClockwise);
    assert!(predicted > 0);
}

#[test]
fn test_reentering_buff_restarts_direction() {
    let mut assistant = AimAssistant::new(Arm::Infantry);
    assistant.set_enemy_team(Team::Red);
    assistant.set_rfid(Rfid::Buff);
    aim_rotating(&mut assistant, &rotating_frames(Direction::CounterClockwise, 8));
    assert_eq!(assistant.buff_predictor().direction(), Direction::CounterClockwise);

    // Staying in buff mode keeps the session
    assistant.set_rfid(Rfid::Buff);
    assert_eq!(assistant.buff_predictor().direction(), Direction::CounterClockwise);

    assistant.set_rfid(Rfid::Unknown);
    assert_eq!(assistant.method(), AimMethod::Armor);
    assistant.set_rfid(Rfid::Buff);
    assert_eq!(assistant.buff_predictor().direction(), Direction::Unknown);

    let predicted = aim_rotating(&mut assistant, &rotating_frames(Direction::Clockwise, 8));
    assert_eq!(assistant.buff_predictor().direction(), Direction::Clockwise);
    assert!(predicted > 0);
}

#[test]
fn test_armor_pipeline_tracks_plate() {
    let mut frame = Frame::new(320, 200);
    paint(&mut frame, 97, 85, 6, 30);
    paint(&mut frame, 157, 85, 6, 30);

    let mut assistant = AimAssistant::new(Arm::Sentry);
    assistant.set_enemy_team(Team::Red);
    let out = assistant.aim(&frame).unwrap();

    assert_eq!(assistant.ranked().len(), 1);
    assert_eq!(out.len(), 1);
    assert!(near(out[0].center(), 129.5, 99.5), "armor {:?}", out[0].center());

    let overlay = assistant.visualize_result(4);
    let renderer = OverlayRenderer::new(&Default::default());
    let mut canvas = frame.clone();
    assert!(renderer.render(&mut canvas, &overlay) > 0);
}

#[test]
fn test_from_config_writes_param_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AimConfig::hero(Team::Blue);
    config.params = ParamPaths::in_dir(dir.path());

    let assistant = AimAssistant::from_config(&config).unwrap();
    assert_eq!(assistant.arm(), Arm::Hero);
    for path in config.params.all() {
        assert!(path.exists(), "{} missing", path.display());
    }
}

#[test]
fn test_from_config_loads_templates() {
    let mut frame = Frame::new(320, 200);
    paint(&mut frame, 97, 85, 6, 30);
    paint(&mut frame, 157, 85, 6, 30);

    // The template is the face of the plate itself
    let mut plain = AimAssistant::new(Arm::Sentry);
    plain.set_enemy_team(Team::Red);
    plain.aim(&frame).unwrap();
    let face = OpenCvOracle.face(&frame, &plain.ranked()[0]).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let templates = dir.path().join("templates");
    std::fs::create_dir(&templates).unwrap();
    face.save(templates.join("SENTRY.png")).unwrap();

    let mut config = AimConfig::sentry(Team::Red);
    config.params = ParamPaths::in_dir(dir.path().join("params"));
    config.templates = Some(templates);
    let mut assistant = AimAssistant::from_config(&config).unwrap();
    assistant.aim(&frame).unwrap();

    assert_eq!(assistant.ranked().len(), 1);
    assert_eq!(assistant.ranked()[0].label(), ArmorLabel::Sentry);
    assert_eq!(plain.ranked()[0].label(), ArmorLabel::Unknown);
}
