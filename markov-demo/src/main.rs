use std::env;

use markov_core::io::load_corpus;
use markov_core::{Chain, Generator, START_TOKEN, ScriptedDraws};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Order 2: every state is made of the two previous tokens
    let mut chain = Chain::new(2);
    chain.add(&["I", "am", "Sam", "Sam", "I", "am"]);

    // Stepping by hand: the caller slides the window and stops on ""
    let mut draws = ScriptedDraws::new([0, 0, 0, 0, 0, 0, 1]);
    let mut state = vec![START_TOKEN.to_owned(); chain.order()];
    loop {
        let next = chain.generate_deterministic(&state, &mut draws)?;
        if next.is_empty() {
            break;
        }
        println!("{:?} -> {}", state, next);
        state.remove(0);
        state.push(next);
    }

    // Probabilities are count / row total
    println!("P(Sam | I am) = {}", chain.transition_probability("Sam", &["I", "am"])?);

    // A state the chain never saw is an error, not an empty result
    match chain.generate(&["Sam", "am"]) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("{e}"),
    }

    // Optional corpus: one sequence per line, trained in parallel and cached as .bin
    if let Some(path) = env::args().nth(1) {
        let order = env::args().nth(2).and_then(|o| o.parse().ok()).unwrap_or(2);
        let corpus = load_corpus(&path, order)?;
        println!("{path}: {} states, {} tokens", corpus.state_count(), corpus.vocabulary_len());

        let generator = Generator::new(&corpus).max_tokens(40);
        let mut rng = rand::rng();
        for i in 0..10 {
            println!("Generated sentence {}: {}", i + 1, generator.sentence(None::<&[&str]>, &mut rng)?);
        }
    }

    Ok(())
}
