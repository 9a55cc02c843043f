// cli.rs: 命令行参数

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "little_planet",
    version,
    about = "Little planet editor for equirectangular panoramas"
)]
pub struct Cli {
    /// Panorama to open in the editor.
    #[arg(value_name = "PANORAMA")]
    pub panorama: Option<PathBuf>,

    /// Settings file (default: $LITTLE_PLANET_CONFIG, then little_planet.json).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Render without a window and exit.
    #[arg(long, num_args = 2, value_names = ["PANORAMA", "OUTPUT"])]
    pub render: Option<Vec<PathBuf>>,

    /// Logo image to composite.
    #[arg(long, value_name = "PATH")]
    pub logo: Option<PathBuf>,

    /// Edge length of the rendered PNG; overrides the settings file.
    #[arg(long, value_name = "PIXELS")]
    pub size: Option<u32>,
}

impl Cli {
    /// `(panorama, output)` when running headless.
    pub fn render_paths(&self) -> Option<(&PathBuf, &PathBuf)> {
        match self.render.as_deref() {
            Some([panorama, output]) => Some((panorama, output)),
            _ => None,
        }
    }
}
