use crate::config::options::{DitherMode, FilterKind, ScalerKind};
use crate::config::profile::{ColorMatrix, MatrixCoeffs};
use crate::foundation::core::{Quad, Rect};
use crate::foundation::error::{GxError, GxResult};
use crate::stage::fingerprint::{BlockFingerprint, StableHasher};
use crate::surface::format::PixelFormat;
use crate::surface::{Placement, Surface, SurfaceShape};
use smallvec::SmallVec;

/// Most sources a dithered cross-fade may blend.
pub const MAX_FADE_SOURCES_DITHERED: usize = 7;
/// Most sources an undithered cross-fade may blend.
pub const MAX_FADE_SOURCES: usize = 8;

/// YUV similarity tolerances used by the soft Scale2x variant.
pub const YUV_TOLERANCE: [u8; 3] = [13, 13, 23];

/// What the packed surface holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PackedMode {
    /// Running average of every frame so far.
    Accumulate,
    /// BT.601 studio-range Y/Cb/Cr of the current frame.
    Yuv,
}

/// Stage variant plus the parameters baked into its command block.
#[derive(Clone, Debug, PartialEq)]
pub enum StageKind {
    /// Convert → packed.
    Packed {
        /// Packed contents.
        mode: PackedMode,
        /// Per-channel weight of the current frame (accumulate only).
        weight: [u8; 3],
    },
    /// Convert (and packed) → planar, through the selected filter.
    Planar {
        /// Filter.
        filter: FilterKind,
        /// Per-channel weight of the current frame (temporal filters only).
        weight: [u8; 3],
    },
    /// Planar → prescale through the transfer tables.
    Prescale {
        /// Quantization.
        dither: DitherMode,
    },
    /// Several planar-shaped sources → prescale, attenuated and summed.
    Fade {
        /// Quantization.
        dither: DitherMode,
        /// Attenuation byte per source, bottom first.
        alphas: SmallVec<[u8; 8]>,
    },
    /// Prescale → host frame through the primaries matrix and scaler.
    Preview {
        /// Primaries.
        matrix: ColorMatrix,
        /// Magnification.
        scaler: ScalerKind,
        /// Output encode exponent.
        output_gamma: f32,
        /// Luma-only output.
        mono: bool,
    },
}

/// Edge-directed 2x rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeRule {
    /// Classic Scale2x.
    Scale2x,
    /// Scale2x with a 50/50 edge blend.
    Scale2xPlus,
    /// Scale2x with YUV similarity.
    Scale2xEx,
    /// Eagle corners.
    Eagle,
    /// Scanlines on the field rows.
    Scan,
    /// Nearest.
    Nearest,
}

/// Equality test used by edge rules and deflicker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Compare {
    /// Exact RGB equality.
    ExactRgb,
    /// Every YUV component within tolerance (read from the packed unit).
    YuvTolerance([u8; 3]),
}

/// Indirect table lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Lookup {
    /// Per-plane transfer table; `wide` selects the 16-bit entries.
    Lut {
        /// 16-bit entries.
        wide: bool,
    },
    /// Dither pattern (or fast-path offset).
    Pattern(DitherMode),
    /// Output encode table.
    Gamma(f32),
}

/// Pixel combiner program.
#[derive(Clone, Debug, PartialEq)]
pub enum Combine {
    /// Copy (nearest magnification, planar split when the output is planar).
    Copy,
    /// `lerp(unit1, unit0, k)`.
    Lerp {
        /// Weight of unit 0.
        k: [u8; 3],
    },
    /// `lerp(unit1, unit0, k)` when unit 0 equals unit 2, else unit 0.
    Deflicker {
        /// Weight of unit 0.
        k: [u8; 3],
    },
    /// `lerp(dst, unit0, k)`.
    Accumulate {
        /// Weight of unit 0.
        k: [u8; 3],
    },
    /// RGB → YCbCr.
    Yuv,
    /// Edge-directed 2x.
    Edge2x(EdgeRule),
    /// Weighted sum of attenuated units.
    Attenuate {
        /// Attenuation byte per unit.
        alphas: SmallVec<[u8; 8]>,
    },
    /// Primaries matrix.
    Matrix {
        /// Coefficients.
        coeffs: MatrixCoeffs,
        /// Luma-only.
        mono: bool,
    },
    /// Magnification.
    Scale(ScalerKind),
}

/// One entry of a command block.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// Bind input `input` at history depth `look_back` to texture unit `unit`.
    Fetch {
        /// Texture unit.
        unit: u8,
        /// Index into the stage inputs.
        input: u8,
        /// Frames back from the current one.
        look_back: u8,
    },
    /// Table lookup.
    Lookup(Lookup),
    /// Equality test.
    Compare(Compare),
    /// Combiner.
    Combine(Combine),
    /// Position and rotation of the quad drawn by the next draw, when it does not simply fill
    /// the destination.
    Place(Quad),
    /// Rasterize `src` onto `dst`.
    Draw {
        /// Source rectangle in input 0.
        src: Rect,
        /// Destination rectangle.
        dst: Rect,
    },
}

/// Shape, depth and placement a stage expects of one input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InputDesc {
    /// Size, format and plane count.
    pub shape: SurfaceShape,
    /// Valid rectangle.
    pub rect: Rect,
    /// Shadow ring length.
    pub shadows: usize,
    /// Placement.
    pub placement: Placement,
}

impl InputDesc {
    /// Describe a bound surface.
    pub fn of(s: &Surface) -> Self {
        Self {
            shape: s.shape(),
            rect: s.rect(),
            shadows: s.shadow_count(),
            placement: s.placement(),
        }
    }
}

/// What a stage writes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutputDesc {
    /// A surface of this shape.
    Surface(SurfaceShape),
    /// An RGB8 host frame.
    Frame {
        /// Width.
        width: u32,
        /// Height.
        height: u32,
        /// Where the drawn quad lands inside the frame.
        dest: Quad,
    },
}

impl OutputDesc {
    /// Describe an output surface.
    pub fn of(s: &Surface) -> Self {
        Self::Surface(s.shape())
    }

    /// A `width`x`height` host frame filled edge to edge.
    pub fn frame(width: u32, height: u32) -> Self {
        Self::Frame {
            width,
            height,
            dest: Quad::covering(width, height),
        }
    }

    fn size(self) -> (u32, u32) {
        match self {
            Self::Surface(s) => (s.width, s.height),
            Self::Frame { width, height, .. } => (width, height),
        }
    }
}

/// A built, replayable stage program.
#[derive(Clone, Debug)]
pub struct CommandBlock {
    kind: StageKind,
    inputs: SmallVec<[InputDesc; 4]>,
    output: OutputDesc,
    ops: Vec<Op>,
    bytes: Vec<u8>,
    fingerprint: BlockFingerprint,
}

impl CommandBlock {
    /// Validate `inputs`/`output` against `kind` and emit the op list.
    pub fn build(kind: StageKind, inputs: &[InputDesc], output: OutputDesc) -> GxResult<Self> {
        let ops = emit(&kind, inputs, output)?;
        for op in &ops {
            if let Op::Fetch {
                input, look_back, ..
            } = *op
            {
                check_history(&inputs[usize::from(input)], usize::from(look_back))?;
            }
        }
        let bytes = encode(&ops);
        let mut h = StableHasher::new();
        h.write_u32(inputs.len() as u32);
        for i in inputs {
            write_input(&mut h, i);
        }
        let (ow, oh) = output.size();
        h.write_u8(matches!(output, OutputDesc::Frame { .. }) as u8);
        h.write_u32(ow);
        h.write_u32(oh);
        if let OutputDesc::Surface(s) = output {
            h.write_u8(s.format.tag());
            h.write_u8(s.planes);
        }
        h.write_u64(bytes.len() as u64);
        h.write_bytes(&bytes);
        Ok(Self {
            kind,
            inputs: inputs.iter().copied().collect(),
            output,
            ops,
            bytes,
            fingerprint: h.finish(),
        })
    }

    /// Stage variant.
    pub fn kind(&self) -> &StageKind {
        &self.kind
    }

    /// Inputs the block was built for.
    pub fn inputs(&self) -> &[InputDesc] {
        &self.inputs
    }

    /// Output the block was built for.
    pub fn output(&self) -> OutputDesc {
        self.output
    }

    /// Op list in execution order.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Encoded op stream.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `true` for an empty stream (never produced by [`CommandBlock::build`]).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Stable identity of the block.
    pub fn fingerprint(&self) -> BlockFingerprint {
        self.fingerprint
    }

    /// `(input, look_back)` per texture unit, in unit order.
    pub fn fetches(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.ops.iter().filter_map(|op| match *op {
            Op::Fetch {
                input, look_back, ..
            } => Some((usize::from(input), usize::from(look_back))),
            _ => None,
        })
    }

    /// Deterministic listing used by the CLI and determinism tests.
    pub fn dump(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("CommandBlock {:?}\n", self.kind));
        s.push_str(&format!("inputs: {}\n", self.inputs.len()));
        for (i, d) in self.inputs.iter().enumerate() {
            s.push_str(&format!(
                "  I{}: {}x{} {:?} planes={} rect={:?} shadows={} {:?}\n",
                i,
                d.shape.width,
                d.shape.height,
                d.shape.format,
                d.shape.planes,
                d.rect,
                d.shadows,
                d.placement
            ));
        }
        s.push_str(&format!("output: {:?}\n", self.output));
        s.push_str(&format!("ops: {}\n", self.ops.len()));
        for (i, op) in self.ops.iter().enumerate() {
            s.push_str(&format!("  O{i}: {op:?}\n"));
        }
        s.push_str(&format!(
            "bytes: {} fingerprint: {:016x}{:016x}\n",
            self.bytes.len(),
            self.fingerprint.hi,
            self.fingerprint.lo
        ));
        s
    }
}

fn check_history(input: &InputDesc, look_back: usize) -> GxResult<()> {
    if look_back >= input.shadows {
        return Err(GxError::mismatch(format!(
            "look-back {look_back} needs more than {} shadow slots",
            input.shadows
        )));
    }
    if look_back > 0 && input.placement == Placement::Cached {
        return Err(GxError::mismatch(format!(
            "look-back {look_back} on a cached input"
        )));
    }
    Ok(())
}

fn expect_inputs(inputs: &[InputDesc], n: usize, what: &str) -> GxResult<()> {
    if inputs.len() != n {
        return Err(GxError::mismatch(format!(
            "{what} takes {n} inputs, got {}",
            inputs.len()
        )));
    }
    Ok(())
}

fn expect_packed_color(d: &InputDesc, what: &str) -> GxResult<()> {
    if d.shape.planes != 1 || d.shape.format.is_single_channel() {
        return Err(GxError::mismatch(format!(
            "{what} input must be packed color, got {:?} x{}",
            d.shape.format, d.shape.planes
        )));
    }
    Ok(())
}

fn expect_planar(shape: SurfaceShape, indexed: bool, what: &str) -> GxResult<()> {
    let format_ok = if indexed {
        shape.format.is_indexed()
    } else {
        shape.format.is_single_channel()
    };
    if shape.planes != 3 || !format_ok {
        return Err(GxError::mismatch(format!(
            "{what} needs 3 single-channel planes, got {:?} x{}",
            shape.format, shape.planes
        )));
    }
    Ok(())
}

fn surface_output(output: OutputDesc, what: &str) -> GxResult<SurfaceShape> {
    match output {
        OutputDesc::Surface(s) => Ok(s),
        OutputDesc::Frame { .. } => Err(GxError::mismatch(format!(
            "{what} writes a surface, not a host frame"
        ))),
    }
}

// Integer factor mapping the valid input rect onto the whole output.
fn integer_scale(src: Rect, out: SurfaceShape, what: &str) -> GxResult<u32> {
    let s = out.width / src.w.max(1);
    if s == 0 || src.w * s != out.width || src.h * s != out.height {
        return Err(GxError::mismatch(format!(
            "{what}: {}x{} is not an integer multiple of {}x{}",
            out.width, out.height, src.w, src.h
        )));
    }
    Ok(s)
}

fn fetch(unit: u8, input: u8, look_back: u8) -> Op {
    Op::Fetch {
        unit,
        input,
        look_back,
    }
}

fn emit(kind: &StageKind, inputs: &[InputDesc], output: OutputDesc) -> GxResult<Vec<Op>> {
    let mut ops = Vec::with_capacity(8);
    match kind {
        StageKind::Packed { mode, weight } => {
            expect_inputs(inputs, 1, "packed stage")?;
            expect_packed_color(&inputs[0], "packed stage")?;
            let out = surface_output(output, "packed stage")?;
            if out.format != PixelFormat::Rgba8
                || out.planes != 1
                || out.width != inputs[0].shape.width
                || out.height != inputs[0].shape.height
            {
                return Err(GxError::mismatch(format!(
                    "packed stage output must be Rgba8 {}x{}",
                    inputs[0].shape.width, inputs[0].shape.height
                )));
            }
            ops.push(fetch(0, 0, 0));
            ops.push(Op::Combine(match mode {
                PackedMode::Accumulate => Combine::Accumulate { k: *weight },
                PackedMode::Yuv => Combine::Yuv,
            }));
            ops.push(Op::Draw {
                src: inputs[0].rect,
                dst: inputs[0].rect,
            });
        }
        StageKind::Planar { filter, weight } => {
            let out = surface_output(output, "planar stage")?;
            expect_planar(out, false, "planar stage output")?;
            let n = if matches!(filter, FilterKind::Scale2xEx) {
                2
            } else {
                1
            };
            expect_inputs(inputs, n, "planar stage")?;
            for d in inputs {
                expect_packed_color(d, "planar stage")?;
            }
            let scale = integer_scale(inputs[0].rect, out, "planar stage")?;
            if filter.is_2x() && scale < 2 {
                return Err(GxError::mismatch(format!(
                    "{filter:?} needs a planar surface at least twice the source"
                )));
            }
            match filter {
                FilterKind::None | FilterKind::Accumulate => {
                    ops.push(fetch(0, 0, 0));
                    ops.push(Op::Combine(Combine::Copy));
                }
                FilterKind::Blend => {
                    ops.push(fetch(0, 0, 0));
                    ops.push(fetch(1, 0, 1));
                    ops.push(Op::Combine(Combine::Lerp { k: *weight }));
                }
                FilterKind::Deflicker => {
                    ops.push(fetch(0, 0, 0));
                    ops.push(fetch(1, 0, 1));
                    ops.push(fetch(2, 0, 2));
                    ops.push(Op::Compare(Compare::ExactRgb));
                    ops.push(Op::Combine(Combine::Deflicker { k: *weight }));
                }
                FilterKind::Scale2xEx => {
                    ops.push(fetch(0, 0, 0));
                    ops.push(fetch(1, 1, 0));
                    ops.push(Op::Compare(Compare::YuvTolerance(YUV_TOLERANCE)));
                    ops.push(Op::Combine(Combine::Edge2x(EdgeRule::Scale2xEx)));
                }
                FilterKind::Scale2x | FilterKind::Scale2xPlus | FilterKind::Eagle2x => {
                    ops.push(fetch(0, 0, 0));
                    ops.push(Op::Compare(Compare::ExactRgb));
                    ops.push(Op::Combine(Combine::Edge2x(match filter {
                        FilterKind::Scale2x => EdgeRule::Scale2x,
                        FilterKind::Scale2xPlus => EdgeRule::Scale2xPlus,
                        _ => EdgeRule::Eagle,
                    })));
                }
                FilterKind::Scan2x | FilterKind::Normal2x => {
                    ops.push(fetch(0, 0, 0));
                    ops.push(Op::Combine(Combine::Edge2x(
                        if matches!(filter, FilterKind::Scan2x) {
                            EdgeRule::Scan
                        } else {
                            EdgeRule::Nearest
                        },
                    )));
                }
            }
            ops.push(Op::Draw {
                src: inputs[0].rect,
                dst: Rect::sized(out.width, out.height),
            });
        }
        StageKind::Prescale { dither } => {
            expect_inputs(inputs, 1, "prescale stage")?;
            expect_planar(inputs[0].shape, true, "prescale stage input")?;
            let out = surface_output(output, "prescale stage")?;
            expect_planar(out, false, "prescale stage output")?;
            ops.push(fetch(0, 0, 0));
            ops.push(Op::Lookup(Lookup::Lut {
                wide: *dither != DitherMode::None,
            }));
            if *dither != DitherMode::None {
                ops.push(Op::Lookup(Lookup::Pattern(*dither)));
            }
            ops.push(Op::Combine(Combine::Copy));
            ops.push(Op::Draw {
                src: inputs[0].rect,
                dst: Rect::sized(out.width, out.height),
            });
        }
        StageKind::Fade { dither, alphas } => {
            let max = if *dither == DitherMode::None {
                MAX_FADE_SOURCES
            } else {
                MAX_FADE_SOURCES_DITHERED
            };
            if alphas.is_empty() || alphas.len() > max {
                return Err(GxError::mismatch(format!(
                    "fade blends 1..={max} sources with {dither:?}, got {}",
                    alphas.len()
                )));
            }
            expect_inputs(inputs, alphas.len(), "fade stage")?;
            for d in inputs {
                expect_planar(d.shape, true, "fade stage input")?;
                if d.rect != inputs[0].rect {
                    return Err(GxError::mismatch("fade sources differ in size"));
                }
            }
            let out = surface_output(output, "fade stage")?;
            expect_planar(out, false, "fade stage output")?;
            for i in 0..alphas.len() {
                ops.push(fetch(i as u8, i as u8, 0));
            }
            ops.push(Op::Lookup(Lookup::Lut { wide: true }));
            if *dither != DitherMode::None {
                ops.push(Op::Lookup(Lookup::Pattern(*dither)));
            }
            ops.push(Op::Combine(Combine::Attenuate {
                alphas: alphas.clone(),
            }));
            ops.push(Op::Draw {
                src: inputs[0].rect,
                dst: Rect::sized(out.width, out.height),
            });
        }
        StageKind::Preview {
            matrix,
            scaler,
            output_gamma,
            mono,
        } => {
            expect_inputs(inputs, 1, "preview stage")?;
            expect_planar(inputs[0].shape, false, "preview stage input")?;
            let OutputDesc::Frame {
                width,
                height,
                dest,
            } = output
            else {
                return Err(GxError::mismatch("preview stage writes a host frame"));
            };
            if !output_gamma.is_finite() || *output_gamma <= 0.0 {
                return Err(GxError::mismatch("output gamma must be positive"));
            }
            if dest.w == 0 || dest.h == 0 || !dest.rotation.is_finite() {
                return Err(GxError::mismatch(format!(
                    "preview destination {dest:?} is degenerate"
                )));
            }
            ops.push(fetch(0, 0, 0));
            ops.push(Op::Combine(Combine::Matrix {
                coeffs: matrix.coeffs(),
                mono: *mono,
            }));
            ops.push(Op::Combine(Combine::Scale(*scaler)));
            ops.push(Op::Lookup(Lookup::Gamma(*output_gamma)));
            if !dest.covers(width, height) {
                ops.push(Op::Place(dest));
            }
            ops.push(Op::Draw {
                src: inputs[0].rect,
                dst: Rect::sized(width, height),
            });
        }
    }
    Ok(ops)
}

fn write_input(h: &mut StableHasher, d: &InputDesc) {
    h.write_u32(d.shape.width);
    h.write_u32(d.shape.height);
    h.write_u8(d.shape.format.tag());
    h.write_u8(d.shape.planes);
    write_rect(h, d.rect);
    h.write_u32(d.shadows as u32);
    h.write_u8(match d.placement {
        Placement::Unbound => 0,
        Placement::Resident => 1,
        Placement::Cached => 2,
    });
}

fn write_rect(h: &mut StableHasher, r: Rect) {
    h.write_u32(r.x);
    h.write_u32(r.y);
    h.write_u32(r.w);
    h.write_u32(r.h);
}

struct Encoder(Vec<u8>);

impl Encoder {
    fn u8(&mut self, v: u8) {
        self.0.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn rgb(&mut self, v: [u8; 3]) {
        self.0.extend_from_slice(&v);
    }

    fn rect(&mut self, r: Rect) {
        for v in [r.x, r.y, r.w, r.h] {
            self.u32(v);
        }
    }
}

fn encode(ops: &[Op]) -> Vec<u8> {
    let mut e = Encoder(Vec::with_capacity(ops.len() * 8));
    for op in ops {
        match op {
            Op::Fetch {
                unit,
                input,
                look_back,
            } => {
                e.u8(0x01);
                e.u8(*unit);
                e.u8(*input);
                e.u8(*look_back);
            }
            Op::Lookup(l) => {
                e.u8(0x02);
                match l {
                    Lookup::Lut { wide } => {
                        e.u8(0);
                        e.u8(u8::from(*wide));
                    }
                    Lookup::Pattern(d) => {
                        e.u8(1);
                        e.u8(d.tag());
                    }
                    Lookup::Gamma(g) => {
                        e.u8(2);
                        e.u32(g.to_bits());
                    }
                }
            }
            Op::Compare(c) => {
                e.u8(0x03);
                match c {
                    Compare::ExactRgb => e.u8(0),
                    Compare::YuvTolerance(t) => {
                        e.u8(1);
                        e.rgb(*t);
                    }
                }
            }
            Op::Combine(c) => {
                e.u8(0x04);
                encode_combine(&mut e, c);
            }
            Op::Place(q) => {
                e.u8(0x06);
                e.u32(q.x as u32);
                e.u32(q.y as u32);
                e.u32(q.w);
                e.u32(q.h);
                e.u32(q.rotation.to_bits());
            }
            Op::Draw { src, dst } => {
                e.u8(0x05);
                e.rect(*src);
                e.rect(*dst);
            }
        }
    }
    e.0
}

fn encode_combine(e: &mut Encoder, c: &Combine) {
    match c {
        Combine::Copy => e.u8(0),
        Combine::Lerp { k } => {
            e.u8(1);
            e.rgb(*k);
        }
        Combine::Deflicker { k } => {
            e.u8(2);
            e.rgb(*k);
        }
        Combine::Accumulate { k } => {
            e.u8(3);
            e.rgb(*k);
        }
        Combine::Yuv => e.u8(4),
        Combine::Edge2x(rule) => {
            e.u8(5);
            e.u8(match rule {
                EdgeRule::Scale2x => 0,
                EdgeRule::Scale2xPlus => 1,
                EdgeRule::Scale2xEx => 2,
                EdgeRule::Eagle => 3,
                EdgeRule::Scan => 4,
                EdgeRule::Nearest => 5,
            });
        }
        Combine::Attenuate { alphas } => {
            e.u8(6);
            e.u8(alphas.len() as u8);
            e.0.extend_from_slice(alphas);
        }
        Combine::Matrix { coeffs, mono } => {
            e.u8(7);
            e.u8(u8::from(*mono));
            for row in coeffs.k {
                e.rgb(row);
            }
            for row in coeffs.c {
                for v in row {
                    e.0.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
        Combine::Scale(s) => {
            e.u8(8);
            e.u8(s.tag());
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stage/command.rs"]
mod tests;
