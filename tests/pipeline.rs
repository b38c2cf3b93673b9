use facepatch::{
    Bitmap, EditSession, GenerationOutcome, GestureEvent, Point, Rect, SelectionBox, SessionOpts,
    Viewport,
};

fn gradient(width: u32, height: u32) -> Bitmap {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    });
    Bitmap::from_rgba_image(img).unwrap()
}

fn drag(s: &mut EditSession, vp: &Viewport, from: (f64, f64), to: (f64, f64)) {
    s.pointer(GestureEvent::Start(Point::new(from.0, from.1)), vp)
        .unwrap();
    s.pointer(GestureEvent::Move(Point::new(to.0, to.1)), vp)
        .unwrap();
    s.pointer(GestureEvent::End, vp).unwrap();
}

#[test]
fn half_scale_drag_generates_and_composites_locally() {
    let reference = gradient(2000, 1500);
    let mut s = EditSession::new(SessionOpts::default()).unwrap();
    s.set_reference(reference.clone());
    s.set_source_face(Bitmap::solid(256, 256, [180, 140, 110, 255]).unwrap());

    let vp = Viewport::new(Rect::new(0.0, 0.0, 1000.0, 750.0), 2000, 1500).unwrap();
    drag(&mut s, &vp, (100.0, 100.0), (250.0, 300.0));
    let selection = s.selection().unwrap();
    assert_eq!(selection, SelectionBox::square(200, 200, 400));

    let req = s.begin_generation().unwrap();
    assert_eq!(req.target_crop.dimensions(), (400, 400));
    assert_eq!(req.ticket.selection(), selection);

    // The service answers at its own resolution.
    let patch = Bitmap::solid(1024, 1024, [255, 0, 0, 255]).unwrap();
    assert_eq!(
        s.finish_generation(req.ticket, Ok(patch)).unwrap(),
        GenerationOutcome::Applied
    );

    let comp = s.composite().unwrap().unwrap();
    assert_eq!(comp.dimensions(), reference.dimensions());

    for &(x, y) in &[(0, 0), (199, 199), (600, 600), (1999, 1499), (199, 400), (400, 600)] {
        assert!(!selection.contains(x, y));
        assert_eq!(comp.pixel(x, y), reference.pixel(x, y), "pixel ({x},{y})");
    }
    // Interior past the feather band is fully patch.
    assert_eq!(comp.pixel(400, 400), [255, 0, 0, 255]);
    // The band itself is a mix.
    let edge = comp.pixel(230, 400);
    assert_ne!(edge, reference.pixel(230, 400));
    assert_ne!(edge, [255, 0, 0, 255]);

    let again = s.composite().unwrap().unwrap();
    assert_eq!(again, comp);

    s.set_split(0.0);
    assert_eq!(s.render_compare().unwrap(), reference);
    s.set_split(1.0);
    assert_eq!(s.render_compare().unwrap(), comp);
}

#[test]
fn compare_mid_split_shows_after_on_the_left() {
    let reference = Bitmap::solid(800, 200, [0, 0, 255, 255]).unwrap();
    let mut s = EditSession::new(SessionOpts::default()).unwrap();
    s.set_reference(reference.clone());
    s.set_source_face(Bitmap::solid(32, 32, [9, 9, 9, 255]).unwrap());

    let vp = Viewport::identity(800, 200).unwrap();
    drag(&mut s, &vp, (0.0, 0.0), (200.0, 200.0));
    assert_eq!(s.selection(), Some(SelectionBox::square(0, 0, 200)));

    let req = s.begin_generation().unwrap();
    s.finish_generation(req.ticket, Ok(Bitmap::solid(64, 64, [255, 0, 0, 255]).unwrap()))
        .unwrap();

    s.set_split(0.125);
    let view = s.render_compare().unwrap();
    let comp = s.composite().unwrap().unwrap();
    // Left of the split is the composite, right of the divider is the reference.
    assert_eq!(view.pixel(50, 100), comp.pixel(50, 100));
    assert_eq!(view.pixel(700, 100), reference.pixel(700, 100));
    // 800 px wide gives a 2 px divider centred on x = 100.
    assert_eq!(view.pixel(100, 100), facepatch::compare::renderer::DIVIDER_RGBA);
}

#[test]
fn encoded_inputs_flow_through_the_decode_cache() {
    let reference = gradient(120, 90);
    let face = Bitmap::solid(40, 40, [10, 20, 30, 255]).unwrap();
    let ref_png = facepatch::encode_png(&reference).unwrap();
    let face_png = facepatch::encode_png(&face).unwrap();

    let mut s = EditSession::new(SessionOpts::default()).unwrap();
    s.load_reference_bytes(&ref_png).unwrap();
    s.load_source_face_bytes(&face_png).unwrap();
    s.load_reference_bytes(&ref_png).unwrap();

    assert_eq!(s.reference().unwrap().as_premul(), reference.as_premul());
    assert_eq!(s.source_face().unwrap().as_premul(), face.as_premul());
    assert_eq!(s.decode_cache().len(), 2);
    assert_eq!(
        s.decode_cache().decode_count(facepatch::SourceKey::of(&ref_png)),
        1
    );

    assert!(s.load_reference_bytes(b"not an image").is_err());
    assert_eq!(s.reference().unwrap().dimensions(), (120, 90));
}
