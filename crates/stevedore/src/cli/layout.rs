use crate::cli::download::Outcome;
use crate::config::CliConfig;

pub fn print(config: &CliConfig) -> Outcome {
    let layouts = config.layouts();
    println!("node   {}", layouts.node_id);
    println!("store  {}", config.paths.store.display());
    println!("run    {}", layouts.run.root().display());
    println!("shared {}", layouts.shared.root().display());
    println!("cache  {}", layouts.cache.root().display());
    Outcome::Succeeded
}
