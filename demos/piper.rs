use std::time::Instant;

use wasinn_piper::backend::{new_backend, Device, Tensor};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut backend = new_backend();
    let run_config = r#"{
        "model": "models/piper/en_US-lessac-medium.onnx",
        "espeak_data": "/usr/share/espeak-ng-data",
        "output_type": "wav",
        "json_input": true
    }"#;

    let load_start = Instant::now();
    let graph = backend.load(&[run_config.as_bytes()], Device::Cpu)?;
    println!("Voice loaded in {:.2?}", load_start.elapsed());

    let context = backend.init_exec_ctx(graph)?;
    let request = r#"{
        "text": "Hello! This is Piper, speaking through a graph and context lifecycle.",
        "length_scale": 0.9,
        "phoneme_silence": {",": 0.3}
    }"#;
    backend.set_input(context, 0, &Tensor::new(&[1], request.as_bytes()))?;

    let synth_start = Instant::now();
    backend.compute(context)?;
    println!("Synthesized in {:.2?}", synth_start.elapsed());

    let mut wav = vec![0u8; 16 * 1024 * 1024];
    let written = backend.get_output(context, 0, &mut wav)?;
    wav.truncate(written as usize);
    std::fs::write("output.wav", &wav)?;
    println!("Saved {written} bytes to output.wav");

    backend.delete_context(context);
    backend.delete_graph(graph);
    Ok(())
}
