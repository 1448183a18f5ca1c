use crate::shapes::rect::RectF32;

const STRIDES: [u32; 4] = [8, 16, 16, 16];
const INPUT_SIZE: u32 = 128;
const ANCHOR_OFFSET: f32 = 0.5;
// aspect ratio 1.0 plus the interpolated scale
const ANCHORS_PER_LAYER: usize = 2;

pub const NUM_ANCHORS: usize = 896;

// SSD anchors for the short range face detector, in normalized [0, 1]
// coordinates. Layers sharing a stride are merged into one feature map, so
// the 16px layers yield 6 anchors per cell. The model regresses absolute
// sizes, every anchor is unit sized.
pub fn gen_anchors() -> Vec<RectF32> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    let mut layer = 0;
    while layer < STRIDES.len() {
        let stride = STRIDES[layer];

        let mut last_same_stride = layer;
        while last_same_stride < STRIDES.len() && STRIDES[last_same_stride] == stride {
            last_same_stride += 1;
        }
        let per_cell = ANCHORS_PER_LAYER * (last_same_stride - layer);

        let feature_map = INPUT_SIZE.div_ceil(stride);
        for y in 0..feature_map {
            for x in 0..feature_map {
                let x_center = (x as f32 + ANCHOR_OFFSET) / feature_map as f32;
                let y_center = (y as f32 + ANCHOR_OFFSET) / feature_map as f32;
                for _ in 0..per_cell {
                    anchors.push(RectF32::from_center(x_center, y_center, 1., 1.));
                }
            }
        }

        layer = last_same_stride;
    }

    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_count() {
        assert_eq!(gen_anchors().len(), NUM_ANCHORS);
    }

    #[test]
    fn test_anchor_layout() {
        let anchors = gen_anchors();

        // 16x16 grid, two per cell
        assert_eq!(anchors[0].center(), anchors[1].center());
        assert_eq!(anchors[0].x, 0.5 / 16.);
        assert_eq!(anchors[2].x, 1.5 / 16.);
        assert_eq!(anchors[32].y, 1.5 / 16.);

        // 8x8 grid, six per cell
        assert_eq!(anchors[512].x, 0.5 / 8.);
        assert_eq!(anchors[517].x, 0.5 / 8.);
        assert_eq!(anchors[518].x, 1.5 / 8.);
        assert_eq!(anchors[895].y, 7.5 / 8.);
        assert!(anchors.iter().all(|a| a.w == 1. && a.h == 1.));
    }
}
