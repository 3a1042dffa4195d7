//! Block-character rendering of rotated and mirrored characters.
//!
//! Each supported character has a 5×7 bitmap. The output grid is sampled at
//! cell centres through the inverse transform (un-rotate, then un-mirror), so
//! the forward transform matches the stimulus: mirror first, then rotate
//! clockwise by the angle.

use mrot_core::Stimulus;

const WIDTH: usize = 5;
const HEIGHT: usize = 7;
const SCALE: f64 = 2.0;
/// Large enough for the scaled bitmap's diagonal at any angle.
const GRID: usize = 18;

const ON: &str = "██";
const OFF: &str = "  ";

fn bitmap(c: char) -> Option<[&'static str; HEIGHT]> {
    Some(match c.to_ascii_uppercase() {
        'R' => ["####.", "#...#", "#...#", "####.", "#.#..", "#..#.", "#...#"],
        'J' => ["..###", "...#.", "...#.", "...#.", "...#.", "#..#.", ".##.."],
        'G' => [".###.", "#...#", "#....", "#.###", "#...#", "#...#", ".###."],
        'F' => ["#####", "#....", "#....", "####.", "#....", "#....", "#...."],
        'L' => ["#....", "#....", "#....", "#....", "#....", "#....", "#####"],
        'P' => ["####.", "#...#", "#...#", "####.", "#....", "#....", "#...."],
        '2' => [".###.", "#...#", "....#", "...#.", "..#..", ".#...", "#####"],
        '4' => ["...#.", "..##.", ".#.#.", "#..#.", "#####", "...#.", "...#."],
        '5' => ["#####", "#....", "####.", "....#", "....#", "#...#", ".###."],
        '7' => ["#####", "....#", "...#.", "..#..", ".#...", ".#...", ".#..."],
        _ => return None,
    })
}

/// Rows of the rendered stimulus, or `None` when the character has no
/// bitmap.
pub fn render(stimulus: &Stimulus) -> Option<Vec<String>> {
    let rows = bitmap(stimulus.character)?;
    let (sin, cos) = (stimulus.angle as f64).to_radians().sin_cos();
    let half_grid = GRID as f64 / 2.0;
    let half_w = WIDTH as f64 * SCALE / 2.0;
    let half_h = HEIGHT as f64 * SCALE / 2.0;

    let lit = |ox: usize, oy: usize| -> bool {
        let dx = ox as f64 + 0.5 - half_grid;
        let dy = oy as f64 + 0.5 - half_grid;
        let mut sx = dx * cos + dy * sin;
        let sy = -dx * sin + dy * cos;
        if stimulus.mirrored {
            sx = -sx;
        }
        let px = ((sx + half_w) / SCALE).floor();
        let py = ((sy + half_h) / SCALE).floor();
        if px < 0.0 || py < 0.0 || px >= WIDTH as f64 || py >= HEIGHT as f64 {
            return false;
        }
        rows[py as usize].as_bytes()[px as usize] == b'#'
    };

    Some(
        (0..GRID)
            .map(|oy| {
                (0..GRID)
                    .map(|ox| if lit(ox, oy) { ON } else { OFF })
                    .collect()
            })
            .collect(),
    )
}
