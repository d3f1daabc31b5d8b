//! Beam search decoding, independent of any model architecture.
//!
//! The model is reached through a step closure: given the live decoder
//! sequences (each starting with the decoder start token) it returns one
//! row of log-probabilities over the vocabulary per sequence.

use std::cmp::Ordering;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct Beam {
    tokens: Vec<u32>,
    sum_logprobs: f32,
}

/// Finished hypotheses, capped at `num_beams`, worst evicted first.
struct Hypotheses {
    items: Vec<(Vec<u32>, f32)>,
    num_beams: usize,
    length_penalty: f32,
    early_stopping: bool,
}

impl Hypotheses {
    fn new(config: &GenerationConfig, num_beams: usize) -> Self {
        Self {
            items: Vec::with_capacity(num_beams + 1),
            num_beams,
            length_penalty: config.length_penalty,
            early_stopping: config.early_stopping,
        }
    }

    fn normalized(&self, sum_logprobs: f32, generated_len: usize) -> f32 {
        sum_logprobs / (generated_len.max(1) as f32).powf(self.length_penalty)
    }

    fn worst_score(&self) -> f32 {
        self.items
            .iter()
            .map(|(_, score)| *score)
            .fold(f32::INFINITY, f32::min)
    }

    /// `tokens` excludes the start token; `generated_len` counts EOS when present.
    fn add(&mut self, tokens: Vec<u32>, sum_logprobs: f32, generated_len: usize) {
        let score = self.normalized(sum_logprobs, generated_len);
        if self.items.len() < self.num_beams || score > self.worst_score() {
            self.items.push((tokens, score));
            if self.items.len() > self.num_beams {
                if let Some(worst) = self
                    .items
                    .iter()
                    .enumerate()
                    .min_by(|a, b| a.1 .1.partial_cmp(&b.1 .1).unwrap_or(Ordering::Equal))
                    .map(|(idx, _)| idx)
                {
                    self.items.remove(worst);
                }
            }
        }
    }

    fn is_done(&self, best_running_sum: f32, generated_len: usize) -> bool {
        if self.items.len() < self.num_beams {
            return false;
        }
        if self.early_stopping {
            return true;
        }
        self.worst_score() >= self.normalized(best_running_sum, generated_len)
    }

    fn best(self) -> Option<Vec<u32>> {
        self.items
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
            .map(|(tokens, _)| tokens)
    }
}

/// Run beam search and return the best continuation, without the start
/// token and without EOS.
pub fn beam_search<F>(
    start_token: u32,
    eos_token: u32,
    config: &GenerationConfig,
    mut step: F,
) -> Result<Vec<u32>>
where
    F: FnMut(&[Vec<u32>]) -> Result<Vec<Vec<f32>>>,
{
    let num_beams = config.num_beams.max(1);
    let mut hypotheses = Hypotheses::new(config, num_beams);
    let mut beams = vec![Beam {
        tokens: vec![start_token],
        sum_logprobs: 0.0,
    }];

    while beams[0].tokens.len() < config.max_length {
        let sequences: Vec<Vec<u32>> = beams.iter().map(|b| b.tokens.clone()).collect();
        let logprobs = step(&sequences)?;
        if logprobs.len() != beams.len() {
            return Err(Error::InferenceError(format!(
                "Decoder returned {} rows for {} beams",
                logprobs.len(),
                beams.len()
            )));
        }

        let candidates = top_candidates(&beams, &logprobs, 2 * num_beams);
        let generated_len = beams[0].tokens.len();

        let mut next = Vec::with_capacity(num_beams);
        for (rank, (score, beam_idx, token)) in candidates.into_iter().enumerate() {
            let parent = &beams[beam_idx];
            if token == eos_token {
                if rank < num_beams {
                    hypotheses.add(parent.tokens[1..].to_vec(), score, generated_len);
                }
                continue;
            }

            let mut tokens = parent.tokens.clone();
            tokens.push(token);
            next.push(Beam {
                tokens,
                sum_logprobs: score,
            });
            if next.len() == num_beams {
                break;
            }
        }

        if next.is_empty() {
            beams.clear();
            break;
        }

        let done = hypotheses.is_done(next[0].sum_logprobs, generated_len);
        beams = next;
        if done {
            beams.clear();
            break;
        }
    }

    // Max length reached: live beams compete with the finished ones.
    for beam in beams {
        let generated_len = beam.tokens.len() - 1;
        hypotheses.add(beam.tokens[1..].to_vec(), beam.sum_logprobs, generated_len);
    }

    Ok(hypotheses.best().unwrap_or_default())
}

/// Best `count` (cumulative score, beam index, token) triples across all beams.
fn top_candidates(beams: &[Beam], logprobs: &[Vec<f32>], count: usize) -> Vec<(f32, usize, u32)> {
    let mut candidates: Vec<(f32, usize, u32)> = Vec::with_capacity(beams.len() * count);

    for (beam_idx, (beam, row)) in beams.iter().zip(logprobs).enumerate() {
        let mut ranked: Vec<(u32, f32)> = row
            .iter()
            .enumerate()
            .filter(|(_, lp)| lp.is_finite())
            .map(|(token, lp)| (token as u32, *lp))
            .collect();
        let keep = count.min(ranked.len());
        if keep == 0 {
            continue;
        }
        if keep < ranked.len() {
            ranked.select_nth_unstable_by(keep - 1, |a, b| {
                b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal)
            });
            ranked.truncate(keep);
        }
        candidates.extend(
            ranked
                .into_iter()
                .map(|(token, lp)| (beam.sum_logprobs + lp, beam_idx, token)),
        );
    }

    candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    candidates.truncate(count);
    candidates
}
