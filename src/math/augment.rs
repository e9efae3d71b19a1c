use rand::Rng;

use crate::error::{NetError, Result};
use crate::math::volume::{Shape, Volume};

/// Cuts a `crop × crop` window out of `volume` starting at `(dx, dy)` and
/// optionally mirrors it left/right.
///
/// Window cells that fall outside the source stay zero.
pub fn augment(volume: &Volume, crop: usize, dx: usize, dy: usize, flip_lr: bool) -> Result<Volume> {
    if crop == 0 {
        return Err(NetError::invalid_option("crop", "must be at least 1"));
    }
    let depth = volume.depth();

    let mut cropped = if crop != volume.width() || crop != volume.height() || dx != 0 || dy != 0 {
        let mut w = Volume::zeros(Shape::new(crop, crop, depth));
        for x in 0..crop {
            for y in 0..crop {
                let (sx, sy) = (x + dx, y + dy);
                if sx >= volume.width() || sy >= volume.height() {
                    continue;
                }
                for d in 0..depth {
                    w.set(x, y, d, volume.get(sx, sy, d)?)?;
                }
            }
        }
        w
    } else {
        volume.clone_values()
    };

    if flip_lr {
        let mut flipped = cropped.clone_and_zero();
        let width = cropped.width();
        for x in 0..width {
            for y in 0..cropped.height() {
                for d in 0..depth {
                    flipped.set(x, y, d, cropped.get(width - x - 1, y, d)?)?;
                }
            }
        }
        cropped = flipped;
    }
    Ok(cropped)
}

/// [`augment`] with the crop offset drawn uniformly from the positions that
/// keep the window inside the volume.
pub fn random_augment(volume: &Volume, crop: usize, flip_lr: bool, rng: &mut impl Rng) -> Result<Volume> {
    if crop > volume.width() || crop > volume.height() {
        return Err(NetError::invalid_option(
            "crop",
            format!("{crop} does not fit inside a {} volume", volume.shape()),
        ));
    }
    let dx = rng.gen_range(0..=volume.width() - crop);
    let dy = rng.gen_range(0..=volume.height() - crop);
    augment(volume, crop, dx, dy, flip_lr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ramp(width: usize, height: usize) -> Volume {
        let values = (0..width * height).map(|i| i as f64).collect();
        Volume::with_values(Shape::new(width, height, 1), values).unwrap()
    }

    #[test]
    fn crop_copies_the_shifted_window() {
        let v = ramp(4, 4);
        let c = augment(&v, 2, 1, 2, false).unwrap();
        assert_eq!(c.shape(), Shape::new(2, 2, 1));
        assert_eq!(c.values(), &[9.0, 10.0, 13.0, 14.0]);
    }

    #[test]
    fn window_past_the_edge_is_zero_filled() {
        let v = ramp(3, 3);
        let c = augment(&v, 2, 2, 2, false).unwrap();
        assert_eq!(c.values(), &[8.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn flip_mirrors_columns() {
        let v = ramp(3, 1);
        // height is 1, so the 3x3 crop pads the lower rows with zeros
        let f = augment(&v, 3, 0, 0, true).unwrap();
        assert_eq!(&f.values()[0..3], &[2.0, 1.0, 0.0]);
    }

    #[test]
    fn random_crop_stays_inside() {
        let mut rng = StdRng::seed_from_u64(9);
        let v = ramp(5, 5);
        for _ in 0..20 {
            let c = random_augment(&v, 3, false, &mut rng).unwrap();
            assert!(c.values().iter().all(|&x| x >= 0.0));
            assert_eq!(c.shape(), Shape::new(3, 3, 1));
        }
        assert!(random_augment(&v, 6, false, &mut rng).is_err());
    }
}
