use opencv::{
    core::{Mat, Point, Scalar, Vector},
    imgproc,
    prelude::*,
    Result as CvResult,
};

const OUTLINE_COLOR: (f64, f64, f64) = (0.0, 0.0, 255.0);
const OUTLINE_THICKNESS: i32 = 2;

/// Minimum-area rectangle fitted around one foreground region.
///
/// Corners keep the order produced by `box_points`; nothing downstream may
/// assume they are sorted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub corners: [Point; 4],
    pub area: f64,
}

impl OrientedBox {
    #[cfg(test)]
    pub fn from_corners(corners: [(i32, i32); 4]) -> Self {
        Self {
            corners: corners.map(|(x, y)| Point::new(x, y)),
            area: 0.0,
        }
    }
}

pub struct RegionExtractor {
    min_area: f64,
}

impl RegionExtractor {
    pub fn new(min_area: f64) -> Self {
        Self { min_area }
    }

    /// Fit a rotated rectangle to every outer contour of `mask` whose area
    /// reaches `min_area`. Output order follows contour order.
    pub fn extract(&self, mask: &Mat) -> CvResult<Vec<OrientedBox>> {
        let mut contours: Vector<Vector<Point>> = Vector::new();
        imgproc::find_contours(
            mask,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )?;

        let mut boxes = Vec::new();
        let mut rejected = 0usize;

        for contour in contours.iter() {
            let area = imgproc::contour_area(&contour, false)?;
            if area < self.min_area {
                rejected += 1;
                continue;
            }

            let rect = imgproc::min_area_rect(&contour)?;
            let mut points = Mat::default();
            imgproc::box_points(rect, &mut points)?;

            let mut corners = [Point::default(); 4];
            for (row, corner) in corners.iter_mut().enumerate() {
                // Truncate toward zero, same as an integer cast of the float corners.
                let x = *points.at_2d::<f32>(row as i32, 0)?;
                let y = *points.at_2d::<f32>(row as i32, 1)?;
                *corner = Point::new(x as i32, y as i32);
            }

            boxes.push(OrientedBox { corners, area });
        }

        tracing::trace!(
            contours = contours.len(),
            kept = boxes.len(),
            rejected,
            min_area = self.min_area,
            "regions extracted"
        );

        Ok(boxes)
    }

    /// Outline `boxes` onto `canvas`. Purely cosmetic.
    pub fn draw(canvas: &mut Mat, boxes: &[OrientedBox]) -> CvResult<()> {
        let (b, g, r) = OUTLINE_COLOR;
        for bx in boxes {
            let mut polygon: Vector<Vector<Point>> = Vector::new();
            polygon.push(Vector::from_slice(&bx.corners));
            imgproc::polylines(
                canvas,
                &polygon,
                true,
                Scalar::new(b, g, r, 0.0),
                OUTLINE_THICKNESS,
                imgproc::LINE_8,
                0,
            )?;
        }
        Ok(())
    }
}
