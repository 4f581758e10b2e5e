//! Confusion matrix heatmap

use crate::error::{PipelineError, Result};
use crate::metrics::ConfusionMatrix;
use plotters::coord::Shift;
use plotters::prelude::*;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 560;
const MARGIN_LEFT: i32 = 140;
const MARGIN_TOP: i32 = 70;
const MARGIN_BOTTOM: i32 = 90;
const MARGIN_RIGHT: i32 = 40;

fn render_err<E: std::fmt::Display>(err: E) -> PipelineError {
    PipelineError::Render(err.to_string())
}

/// Caption line with accuracy and misclassification rate
pub fn summary_caption(matrix: &ConfusionMatrix) -> String {
    format!(
        "accuracy={:.4}; misclass={:.4}",
        matrix.accuracy(),
        matrix.misclassification()
    )
}

/// Draw `matrix` as an SVG heatmap with one labelled cell per (true, predicted) pair
pub fn render_confusion_svg(matrix: &ConfusionMatrix, label_names: &[String]) -> Result<String> {
    if label_names.len() != matrix.labels().len() {
        return Err(PipelineError::Render(format!(
            "{} label names for {} matrix classes",
            label_names.len(),
            matrix.labels().len()
        )));
    }

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        draw_heatmap(&root, matrix, label_names)?;
        root.present().map_err(render_err)?;
    }
    Ok(svg)
}

fn draw_heatmap<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    matrix: &ConfusionMatrix,
    label_names: &[String],
) -> Result<()> {
    root.fill(&WHITE).map_err(render_err)?;

    root.draw(&Text::new(
        "Confusion matrix",
        (MARGIN_LEFT, 20),
        ("sans-serif", 22).into_font().color(&BLACK),
    ))
    .map_err(render_err)?;

    let n = matrix.labels().len().max(1) as i32;
    let grid_w = WIDTH as i32 - MARGIN_LEFT - MARGIN_RIGHT;
    let grid_h = HEIGHT as i32 - MARGIN_TOP - MARGIN_BOTTOM;
    let cell_w = grid_w / n;
    let cell_h = grid_h / n;
    let max_count = matrix.counts().iter().copied().max().unwrap_or(0).max(1) as f64;

    let label_style = ("sans-serif", 14).into_font().color(&BLACK);
    for (row, counts) in matrix.to_rows().iter().enumerate() {
        let y0 = MARGIN_TOP + row as i32 * cell_h;
        for (col, &count) in counts.iter().enumerate() {
            let x0 = MARGIN_LEFT + col as i32 * cell_w;
            let shade = count as f64 / max_count;
            let fill = RGBColor(
                (255.0 - 200.0 * shade) as u8,
                (255.0 - 150.0 * shade) as u8,
                255,
            );
            root.draw(&Rectangle::new([(x0, y0), (x0 + cell_w, y0 + cell_h)], fill.filled()))
                .map_err(render_err)?;
            root.draw(&Rectangle::new([(x0, y0), (x0 + cell_w, y0 + cell_h)], BLACK.stroke_width(1)))
                .map_err(render_err)?;

            let text_color = if shade > 0.6 { WHITE } else { BLACK };
            root.draw(&Text::new(
                count.to_string(),
                (x0 + cell_w / 2 - 8, y0 + cell_h / 2 - 8),
                ("sans-serif", 18).into_font().color(&text_color),
            ))
            .map_err(render_err)?;
        }

        root.draw(&Text::new(
            label_names[row].clone(),
            (10, y0 + cell_h / 2 - 7),
            label_style.clone(),
        ))
        .map_err(render_err)?;
    }

    for (col, name) in label_names.iter().enumerate() {
        let x0 = MARGIN_LEFT + col as i32 * cell_w;
        root.draw(&Text::new(
            name.clone(),
            (x0 + 8, MARGIN_TOP + n * cell_h + 8),
            label_style.clone(),
        ))
        .map_err(render_err)?;
    }

    root.draw(&Text::new(
        "true label (rows) / predicted label (columns)",
        (MARGIN_LEFT, HEIGHT as i32 - 50),
        ("sans-serif", 13).into_font().color(&RGBColor(90, 90, 90)),
    ))
    .map_err(render_err)?;
    root.draw(&Text::new(
        summary_caption(matrix),
        (MARGIN_LEFT, HEIGHT as i32 - 28),
        ("sans-serif", 16).into_font().color(&BLACK),
    ))
    .map_err(render_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_format() {
        let matrix = ConfusionMatrix::from_labels(&[0, 1, 0, 1], &[0, 0, 0, 1]).unwrap();
        assert_eq!(summary_caption(&matrix), "accuracy=0.7500; misclass=0.2500");
    }

    #[test]
    fn test_svg_rendered_in_memory() {
        let matrix = ConfusionMatrix::from_labels(&[0, 1, 0, 1], &[0, 0, 0, 1]).unwrap();
        let names = vec!["Not Default".to_string(), "Default".to_string()];
        let svg = render_confusion_svg(&matrix, &names).unwrap();

        assert!(svg.contains("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("Confusion matrix"));
        assert!(svg.contains("accuracy=0.7500; misclass=0.2500"));
        assert!(svg.contains("Not Default"));
    }

    #[test]
    fn test_name_count_must_match() {
        let matrix = ConfusionMatrix::from_labels(&[0, 1], &[0, 1]).unwrap();
        let names = vec!["Not Default".to_string()];
        assert!(matches!(
            render_confusion_svg(&matrix, &names),
            Err(PipelineError::Render(_))
        ));
    }
}
