/*
Notes:
    density is seeded with the rest density, the seed stands in for the self contribution
    acceleration is force / mass (not force / density)
    per-particle stiffness and rest density are carried but the EOS uses the global ones

TODO:
    Compare the grid search against rstar for large scenes (>100k particles).
*/

mod platform;

fn main() {
    platform::start();
}
