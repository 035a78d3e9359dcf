//! Tile command: footprint of a grid tile

use crate::cli::TileArgs;
use crate::output::OutputWriter;
use crate::output_types::TileOutput;
use anyhow::Result;
use eoflow_geo::Tile;

pub fn execute(args: TileArgs, output: &OutputWriter) -> Result<()> {
    let tile = Tile::from_code(&args.code)?;
    let bounds = tile.utm_bounds;

    let result = TileOutput {
        code: tile.code.clone(),
        utm_crs: tile.utm_crs.authority(),
        utm_crs_raw: tile.utm_crs_raw.clone(),
        utm_bounds: [bounds.min().x, bounds.min().y, bounds.max().x, bounds.max().y],
        wgs84_footprint: tile.wgs84_polygon.exterior().coords().map(|c| [c.x, c.y]).collect(),
    };

    if output.is_json() {
        output.result(result)?;
    } else {
        output.section(format!("Tile {}", result.code));
        output.kv("CRS", format!("{} ({})", result.utm_crs, result.utm_crs_raw));
        let (left, top) = tile.utm_top_left();
        output.kv("Top left", format!("{:.0}, {:.0}", left, top));
        output.kv(
            "Bounds",
            format!(
                "{:.0}, {:.0}, {:.0}, {:.0}",
                result.utm_bounds[0], result.utm_bounds[1], result.utm_bounds[2], result.utm_bounds[3]
            ),
        );
    }

    Ok(())
}
