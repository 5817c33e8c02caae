//! The standard sample font.
//!
//! A complete TrueType container with 40 glyphs, mirroring the shape of
//! a small real font: a run of empty glyphs, an "A" with an inner
//! contour, a hinted square "V", an acute accent, and a composite that
//! assembles "A" plus a scaled, offset accent. The constants here are
//! the ground truth the test suites assert against.

use crate::Writer;

/// Font design units per em.
pub const UNITS_PER_EM: u16 = 2048;

/// Total glyph count.
pub const NUM_GLYPHS: u16 = 40;

/// Number of full entries in `hmtx`.
pub const NUM_H_METRICS: u16 = 38;

/// An empty glyph (zero-length `loca` entry).
pub const GID_EMPTY: u16 = 0;

/// The simple two-contour "A" glyph.
pub const GID_A: u16 = 36;

/// The hinted square "V" glyph.
pub const GID_V: u16 = 37;

/// The acute accent used as a composite component.
pub const GID_ACUTE: u16 = 38;

/// The composite glyph: "A" plus a scaled, offset accent.
pub const GID_COMPOSITE: u16 = 39;

/// Union bounding box written to `head`: x_min, y_min, x_max, y_max.
pub const BOUNDS: [i16; 4] = [0, 0, 1342, 1800];

/// hhea ascent and descent.
pub const ASCENT: i16 = 1638;
pub const DESCENT: i16 = -410;

/// Metrics of the "A" glyph.
pub const ADVANCE_A: u16 = 1366;
pub const LSB_A: i16 = 19;

/// Metrics of the "V" glyph, the last explicit `hmtx` entry.
pub const ADVANCE_LAST_EXPLICIT: u16 = 1300;
pub const LSB_V: i16 = 100;

/// The trailing side bearing of the composite glyph.
pub const LSB_TRAILING: i16 = 19;

/// The kerning adjustment of the (A, V) pair.
pub const KERN_AV: i16 = -144;

/// The "A" glyph: an 8-point outer contour (one off-curve point) and a
/// 3-point inner triangle wound the opposite way. `(x, y, on_curve)`.
pub const A_POINTS: [(i16, i16, bool); 11] = [
    (19, 0, true),
    (19, 150, true),
    (638, 1480, true),
    (723, 1480, true),
    (1342, 150, true),
    (1342, 0, true),
    (768, 0, false),
    (194, 0, true),
    (437, 531, true),
    (680, 1022, true),
    (924, 531, true),
];

/// Cumulative contour end indices of the "A" glyph.
pub const A_ENDS: [usize; 2] = [8, 11];

/// Bounding box written to the "A" glyph header.
pub const A_BOUNDS: [i16; 4] = [19, 0, 1342, 1480];

/// The "V" glyph: a plain square.
pub const V_POINTS: [(i16, i16, bool); 4] = [
    (100, 0, true),
    (1200, 0, true),
    (1200, 1400, true),
    (100, 1400, true),
];

pub const V_BOUNDS: [i16; 4] = [100, 0, 1200, 1400];

/// The "V" glyph's program: `SVTCA[0]` (freedom vector along y), then
/// push point 0 and one pixel, then `SHPIX`. Hinting therefore moves
/// point 0 up by exactly one pixel (64 units in 26.6).
pub const V_INSTRUCTIONS: [u8; 5] = [0x00, 0xb1, 0x00, 0x40, 0x38];

/// The acute accent glyph.
pub const ACUTE_POINTS: [(i16, i16, bool); 3] = [
    (0, 1480, true),
    (300, 1480, true),
    (150, 1800, true),
];

pub const ACUTE_BOUNDS: [i16; 4] = [0, 1480, 300, 1800];

/// The composite offsets the accent by this amount, in font units.
pub const ACUTE_OFFSET: (i16, i16) = (500, 200);

/// The 2.14 scale the composite applies to the accent (0.5).
pub const ACUTE_SCALE: i16 = 0x2000;

pub const COMPOSITE_BOUNDS: [i16; 4] = [19, 0, 1342, 1480];

/// Control value table entries, in font units.
pub const CVT_VALUES: [u16; 3] = [0, 1366, 100];

/// The font program defines (empty) function 1.
const FPGM: [u8; 4] = [0xb0, 0x01, 0x2c, 0x2d];

/// The control value program sets the control value cut-in to 70.
const PREP: [u8; 3] = [0xb0, 70, 0x1d];

/// Assembles the sample font.
pub fn build() -> Vec<u8> {
    build_font(false)
}

/// Assembles the sample font with `vhea`/`vmtx` tables added.
pub fn build_with_vertical() -> Vec<u8> {
    build_font(true)
}

/// Vertical metrics written for every glyph when vertical tables are
/// requested.
pub const ADVANCE_HEIGHT: u16 = 2100;
pub const TSB: i16 = 150;

fn build_font(vertical: bool) -> Vec<u8> {
    let (glyf, loca) = build_glyf_and_loca();
    let mut tables: Vec<([u8; 4], Vec<u8>)> = vec![
        (*b"cmap", build_cmap()),
        (*b"cvt ", build_cvt()),
        (*b"fpgm", FPGM.to_vec()),
        (*b"glyf", glyf),
        (*b"head", build_head()),
        (*b"hhea", build_hhea()),
        (*b"hmtx", build_hmtx()),
        (*b"kern", build_kern()),
        (*b"loca", loca),
        (*b"maxp", build_maxp()),
        (*b"prep", PREP.to_vec()),
    ];
    if vertical {
        tables.push((*b"vhea", build_vhea()));
        tables.push((*b"vmtx", build_vmtx()));
        tables.sort_by_key(|(tag, _)| *tag);
    }

    let num_tables = tables.len() as u16;
    let entry_selector = 15 - num_tables.leading_zeros() as u16;
    let search_range = 16 << entry_selector;

    let mut w = Writer::new();
    w.u32(0x00010000);
    w.u16(num_tables);
    w.u16(search_range);
    w.u16(entry_selector);
    w.u16(num_tables * 16 - search_range);

    let mut offset = 12 + num_tables as usize * 16;
    for (tag, data) in &tables {
        w.bytes(tag);
        w.u32(0); // checksum, unchecked by this pipeline
        w.u32(offset as u32);
        w.u32(data.len() as u32);
        offset += (data.len() + 3) & !3;
    }
    for (_, data) in &tables {
        w.bytes(data);
        for _ in 0..((4 - data.len() % 4) % 4) {
            w.u8(0);
        }
    }
    w.into_vec()
}

fn build_head() -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(0x00010000); // version
    w.u32(0); // fontRevision
    w.u32(0); // checkSumAdjustment
    w.u32(0x5F0F3CF5); // magicNumber
    w.u16(0); // flags
    w.u16(UNITS_PER_EM);
    w.u64(0); // created
    w.u64(0); // modified
    for v in BOUNDS {
        w.i16(v);
    }
    w.u16(0); // macStyle
    w.u16(8); // lowestRecPPEM
    w.i16(2); // fontDirectionHint
    w.i16(1); // indexToLocFormat: long
    w.i16(0); // glyphDataFormat
    w.into_vec()
}

fn build_maxp() -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(0x00010000);
    w.u16(NUM_GLYPHS);
    w.u16(11); // maxPoints
    w.u16(2); // maxContours
    w.u16(14); // maxCompositePoints
    w.u16(3); // maxCompositeContours
    w.u16(2); // maxZones
    w.u16(16); // maxTwilightPoints
    w.u16(64); // maxStorage
    w.u16(8); // maxFunctionDefs
    w.u16(0); // maxInstructionDefs
    w.u16(256); // maxStackElements
    w.u16(16); // maxSizeOfInstructions
    w.u16(2); // maxComponentElements
    w.u16(1); // maxComponentDepth
    w.into_vec()
}

fn build_hhea() -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(0x00010000);
    w.i16(ASCENT);
    w.i16(DESCENT);
    w.i16(67); // lineGap
    w.u16(ADVANCE_A); // advanceWidthMax
    for _ in 0..10 {
        w.i16(0); // bearings, extents, caret slope, reserved
    }
    w.i16(0); // metricDataFormat
    w.u16(NUM_H_METRICS);
    w.into_vec()
}

fn build_vhea() -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(0x00010000);
    w.i16(ASCENT);
    w.i16(DESCENT);
    w.i16(0);
    w.u16(ADVANCE_HEIGHT);
    for _ in 0..10 {
        w.i16(0);
    }
    w.i16(0);
    w.u16(NUM_GLYPHS); // every glyph gets a full vertical metric
    w.into_vec()
}

fn build_hmtx() -> Vec<u8> {
    let mut w = Writer::new();
    for gid in 0..NUM_H_METRICS {
        let (advance, lsb) = match gid {
            GID_A => (ADVANCE_A, LSB_A),
            GID_V => (ADVANCE_LAST_EXPLICIT, LSB_V),
            _ => (600, 50),
        };
        w.u16(advance);
        w.i16(lsb);
    }
    w.i16(0); // GID_ACUTE
    w.i16(LSB_TRAILING); // GID_COMPOSITE
    w.into_vec()
}

fn build_vmtx() -> Vec<u8> {
    let mut w = Writer::new();
    for _ in 0..NUM_GLYPHS {
        w.u16(ADVANCE_HEIGHT);
        w.i16(TSB);
    }
    w.into_vec()
}

fn build_cmap() -> Vec<u8> {
    // Three single-character segments plus the required terminator.
    let mappings = [('A', GID_A), ('V', GID_V), ('Ä', GID_COMPOSITE)];
    let seg_count = mappings.len() as u16 + 1;
    let mut w = Writer::new();
    w.u16(0); // version
    w.u16(1); // numTables
    w.u16(0); // platform: Unicode
    w.u16(3); // specific: 2.0
    w.u32(12); // subtable offset
    // Format 4 subtable.
    w.u16(4);
    w.u16(16 + 8 * seg_count); // length
    w.u16(0); // language
    w.u16(seg_count * 2);
    w.u16(0); // searchRange scaffolding, unused by lookups
    w.u16(0);
    w.u16(0);
    for (ch, _) in mappings {
        w.u16(ch as u16); // endCode
    }
    w.u16(0xffff);
    w.u16(0); // reservedPad
    for (ch, _) in mappings {
        w.u16(ch as u16); // startCode
    }
    w.u16(0xffff);
    for (ch, gid) in mappings {
        w.u16(gid.wrapping_sub(ch as u16)); // idDelta
    }
    w.u16(1);
    for _ in 0..seg_count {
        w.u16(0); // idRangeOffset
    }
    w.into_vec()
}

fn build_kern() -> Vec<u8> {
    let mut w = Writer::new();
    w.u16(0); // version
    w.u16(1); // nTables
    w.u16(0); // subtable version
    w.u16(20); // length: 14 byte header + one pair
    w.u16(0x0001); // coverage: horizontal, format 0
    w.u16(1); // nPairs
    w.u16(6); // searchRange
    w.u16(0); // entrySelector
    w.u16(0); // rangeShift
    w.u16(GID_A);
    w.u16(GID_V);
    w.i16(KERN_AV);
    w.into_vec()
}

fn build_cvt() -> Vec<u8> {
    let mut w = Writer::new();
    for v in CVT_VALUES {
        w.u16(v);
    }
    w.into_vec()
}

fn build_glyf_and_loca() -> (Vec<u8>, Vec<u8>) {
    let glyphs: [(u16, Vec<u8>); 4] = [
        (GID_A, encode_simple(A_BOUNDS, &[&A_POINTS[..8], &A_POINTS[8..]], &[])),
        (GID_V, encode_simple(V_BOUNDS, &[&V_POINTS], &V_INSTRUCTIONS)),
        (GID_ACUTE, encode_simple(ACUTE_BOUNDS, &[&ACUTE_POINTS], &[])),
        (GID_COMPOSITE, encode_composite()),
    ];
    let mut glyf = Writer::new();
    let mut offsets = vec![0u32; NUM_GLYPHS as usize + 1];
    for (gid, data) in &glyphs {
        offsets[*gid as usize] = glyf.len() as u32;
        glyf.bytes(data);
        while glyf.len() % 4 != 0 {
            glyf.u8(0);
        }
        offsets[*gid as usize + 1] = glyf.len() as u32;
    }
    // Glyphs before GID_A are empty: their entries all stay at offset 0.
    let mut loca = Writer::new();
    for offset in offsets {
        loca.u32(offset);
    }
    (glyf.into_vec(), loca.into_vec())
}

const ON_CURVE: u8 = 0x01;
const X_SHORT: u8 = 0x02;
const Y_SHORT: u8 = 0x04;
const REPEAT: u8 = 0x08;
const X_SAME_OR_POSITIVE: u8 = 0x10;
const Y_SAME_OR_POSITIVE: u8 = 0x20;

/// Encode a simple glyph: contour ends, instructions, run-length
/// encoded flags, then delta-encoded coordinates.
fn encode_simple(bounds: [i16; 4], contours: &[&[(i16, i16, bool)]], instructions: &[u8]) -> Vec<u8> {
    let mut w = Writer::new();
    w.i16(contours.len() as i16);
    for v in bounds {
        w.i16(v);
    }
    let mut end = 0u16;
    for contour in contours {
        end += contour.len() as u16;
        w.u16(end - 1);
    }
    w.u16(instructions.len() as u16);
    w.bytes(instructions);

    let points: Vec<(i16, i16, bool)> = contours.iter().flat_map(|c| c.iter().copied()).collect();
    let mut flags = Vec::with_capacity(points.len());
    let mut x_bytes = Writer::new();
    let mut y_bytes = Writer::new();
    let (mut px, mut py) = (0i16, 0i16);
    for &(x, y, on) in &points {
        let mut flag = if on { ON_CURVE } else { 0 };
        let dx = x - px;
        let dy = y - py;
        if dx == 0 {
            flag |= X_SAME_OR_POSITIVE;
        } else if (-255..=255).contains(&dx) {
            flag |= X_SHORT;
            if dx > 0 {
                flag |= X_SAME_OR_POSITIVE;
            }
            x_bytes.u8(dx.unsigned_abs() as u8);
        } else {
            x_bytes.i16(dx);
        }
        if dy == 0 {
            flag |= Y_SAME_OR_POSITIVE;
        } else if (-255..=255).contains(&dy) {
            flag |= Y_SHORT;
            if dy > 0 {
                flag |= Y_SAME_OR_POSITIVE;
            }
            y_bytes.u8(dy.unsigned_abs() as u8);
        } else {
            y_bytes.i16(dy);
        }
        flags.push(flag);
        (px, py) = (x, y);
    }
    // Run-length encode the flags.
    let mut i = 0;
    while i < flags.len() {
        let mut run = 0usize;
        while i + run + 1 < flags.len() && flags[i + run + 1] == flags[i] && run < 255 {
            run += 1;
        }
        if run > 0 {
            w.u8(flags[i] | REPEAT);
            w.u8(run as u8);
        } else {
            w.u8(flags[i]);
        }
        i += run + 1;
    }
    w.bytes(&x_bytes.into_vec());
    w.bytes(&y_bytes.into_vec());
    w.into_vec()
}

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const ARGS_ARE_XY_VALUES: u16 = 0x0002;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const USE_MY_METRICS: u16 = 0x0200;

/// The composite glyph: "A" at the origin carrying the metrics, plus
/// the accent scaled by half and offset.
fn encode_composite() -> Vec<u8> {
    let mut w = Writer::new();
    w.i16(-1);
    for v in COMPOSITE_BOUNDS {
        w.i16(v);
    }
    w.u16(ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES | USE_MY_METRICS | MORE_COMPONENTS);
    w.u16(GID_A);
    w.i16(0);
    w.i16(0);
    w.u16(ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES | WE_HAVE_A_SCALE);
    w.u16(GID_ACUTE);
    w.i16(ACUTE_OFFSET.0);
    w.i16(ACUTE_OFFSET.1);
    w.i16(ACUTE_SCALE);
    w.into_vec()
}
