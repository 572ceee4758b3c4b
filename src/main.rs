use anyhow::{bail, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};

use simsiam::config::Config;
use simsiam::loss;
use simsiam::model::{ResNet18, ResNet18Config, SimSiam, SimSiamConfig};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // Smoke mode: build the model, report sizes, run every forward variant once.
    if args.len() >= 2 && (args[1] == "--smoke" || args[1] == "smoke") {
        let config = Config::from_args_after(&args[2..])?;
        return run_smoke(config);
    }

    eprintln!("usage:");
    eprintln!(
        "  {} --smoke [dim] [pred_dim] [batch] [image_size] [base_width] \
         [--no-stop-grad] [--no-predictor] [--init model.safetensors]",
        args[0]
    );
    bail!("specify a mode: --smoke");
}

fn run_smoke(config: Config) -> Result<()> {
    let device = match Device::new_cuda(0) {
        Ok(d) => {
            eprintln!("using device: CUDA(0)");
            d
        }
        Err(e) => {
            eprintln!("CUDA not available: {e}");
            Device::Cpu
        }
    };

    let mut varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let backbone = ResNet18::new(
        vb.pp("encoder"),
        ResNet18Config {
            base_width: config.base_width,
        },
    )?;
    let model = SimSiam::new(
        vb,
        backbone,
        SimSiamConfig {
            dim: config.dim,
            pred_dim: config.pred_dim,
            stop_grad: config.stop_grad,
            include_predictor: config.include_predictor,
        },
    )?;
    if let Some(ref path) = config.init_path {
        varmap.load(path)?;
        println!("Weights loaded from {:?}", path);
    }

    let (encoder_params, projector_params, predictor_params) = param_counts(&varmap);
    let total = encoder_params + projector_params + predictor_params;
    println!(
        "Model: ~{} [encoder {} + projector {} + predictor {}]",
        format_params(total),
        format_params(encoder_params),
        format_params(projector_params),
        format_params(predictor_params),
    );
    println!(
        "Projection dim: {}, predictor hidden: {}, stop-grad: {}",
        config.dim, config.pred_dim, config.stop_grad
    );

    let shape = (
        config.batch_size,
        3,
        config.image_size,
        config.image_size,
    );
    let x1 = Tensor::randn(0.0f32, 1.0f32, shape, &device)?;
    let x2 = Tensor::randn(0.0f32, 1.0f32, shape, &device)?;

    let (p1, p2, z1, z2) = model.forward(&x1, &x2, true)?;
    println!("forward: p {:?}, z {:?}", p1.dims(), z1.dims());

    let loss_val = loss::symmetric_loss(&p1, &p2, &z1, &z2)?.to_scalar::<f32>()?;
    println!("symmetric loss on random views: {loss_val:.4} (uncorrelated views sit near 0)");

    let latent = model.forward_latent(&x1, false)?;
    let pooled = model.forward_pooled(&x1, false)?;
    println!("forward_latent: {:?}", latent.dims());
    println!("forward_pooled: {:?}", pooled.dims());
    Ok(())
}

/// Actual parameter counts from the varmap, split by top-level prefix.
fn param_counts(varmap: &VarMap) -> (usize, usize, usize) {
    let data = varmap.data().lock().unwrap();
    let mut encoder = 0usize;
    let mut projector = 0usize;
    let mut predictor = 0usize;
    for (name, var) in data.iter() {
        let n = var.as_tensor().elem_count();
        if name.starts_with("encoder.") {
            encoder += n;
        } else if name.starts_with("projector.") {
            projector += n;
        } else if name.starts_with("predictor.") {
            predictor += n;
        }
    }
    (encoder, projector, predictor)
}

/// Format parameter count: <1M => k, <1B => M, otherwise B.
fn format_params(n: usize) -> String {
    const K: usize = 1_000;
    const M: usize = 1_000_000;
    const B: usize = 1_000_000_000;
    if n < M {
        format!("{:.1}k", n as f64 / K as f64)
    } else if n < B {
        format!("{:.2}M", n as f64 / M as f64)
    } else {
        format!("{:.2}B", n as f64 / B as f64)
    }
}
