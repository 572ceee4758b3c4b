use anyhow::{bail, Result};
use std::path::PathBuf;

pub struct Config {
    pub dim: usize,
    pub pred_dim: usize,
    pub batch_size: usize,
    pub image_size: usize,
    pub base_width: usize,
    pub stop_grad: bool,
    pub include_predictor: bool,
    pub init_path: Option<PathBuf>,
}

impl Config {
    /// Parse the args that follow the mode flag: flags first, then
    /// positional values with defaults matching the reference model.
    pub fn from_args_after(args: &[String]) -> Result<Self> {
        let mut stop_grad = true;
        let mut include_predictor = true;
        let mut init_path = None;
        let mut positional: Vec<&String> = Vec::new();

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--no-stop-grad" => stop_grad = false,
                "--no-predictor" => include_predictor = false,
                "--init" => match iter.next() {
                    Some(path) => init_path = Some(PathBuf::from(path)),
                    None => bail!("--init requires a .safetensors path"),
                },
                _ => positional.push(arg),
            }
        }

        Ok(Self {
            dim: positional
                .first()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2048),
            pred_dim: positional
                .get(1)
                .and_then(|v| v.parse().ok())
                .unwrap_or(512),
            batch_size: positional.get(2).and_then(|v| v.parse().ok()).unwrap_or(4),
            image_size: positional
                .get(3)
                .and_then(|v| v.parse().ok())
                .unwrap_or(224),
            base_width: positional
                .get(4)
                .and_then(|v| v.parse().ok())
                .unwrap_or(64),
            stop_grad,
            include_predictor,
            init_path,
        })
    }
}
