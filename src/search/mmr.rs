use crate::search::vector::cosine_similarity;

/// Greedy Maximal Marginal Relevance selection.
///
/// `embed` is called once per candidate; candidates it returns `None` for are
/// dropped. The first pick is the candidate most similar to the query. Each
/// later pick maximises
///
/// ```text
/// lambda * sim(c, query) - (1 - lambda) * max(sim(c, s) for s in selected)
/// ```
///
/// Ties go to the earliest candidate. Returns at most `m` items in selection
/// order.
pub fn mmr_select<T, F>(
    candidates: Vec<T>,
    query_embedding: &[f32],
    mut embed: F,
    m: usize,
    lambda: f32,
) -> Vec<T>
where
    F: FnMut(&T) -> Option<Vec<f32>>,
{
    if candidates.is_empty() || m == 0 {
        return Vec::new();
    }
    let lambda = lambda.clamp(0.0, 1.0);

    let mut pool: Vec<(T, Vec<f32>)> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match embed(&candidate) {
            Some(embedding) => pool.push((candidate, embedding)),
            None => tracing::debug!("Dropping MMR candidate without embedding"),
        }
    }

    let relevance: Vec<f32> = pool
        .iter()
        .map(|(_, e)| cosine_similarity(e, query_embedding))
        .collect();
    // Highest similarity to anything already selected
    let mut redundancy = vec![f32::NEG_INFINITY; pool.len()];
    let mut selected = vec![false; pool.len()];
    let mut order: Vec<usize> = Vec::with_capacity(m.min(pool.len()));

    while order.len() < m && order.len() < pool.len() {
        let mut best: Option<(usize, f32)> = None;
        for i in 0..pool.len() {
            if selected[i] {
                continue;
            }
            let score = if order.is_empty() {
                relevance[i]
            } else {
                lambda * relevance[i] - (1.0 - lambda) * redundancy[i]
            };
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        let Some((pick, _)) = best else { break };
        selected[pick] = true;
        order.push(pick);

        for i in 0..pool.len() {
            if !selected[i] {
                let sim = cosine_similarity(&pool[i].1, &pool[pick].1);
                redundancy[i] = redundancy[i].max(sim);
            }
        }
    }

    let mut slots: Vec<Option<T>> = pool.into_iter().map(|(c, _)| Some(c)).collect();
    order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}
