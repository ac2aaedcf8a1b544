use crossbeam_channel::bounded;

/// Run `f` over `items` on at most `workers` threads. Results come back in input order.
pub(crate) fn map_bounded<T, R, F>(items: Vec<T>, workers: usize, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let total = items.len();
    let workers = workers.clamp(1, total.max(1));
    if workers == 1 {
        return items.into_iter().map(f).collect();
    }

    let (job_tx, job_rx) = bounded::<(usize, T)>(workers);
    let (done_tx, done_rx) = bounded::<(usize, R)>(workers);
    let f = &f;

    std::thread::scope(|s| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            s.spawn(move || {
                for (idx, item) in job_rx.iter() {
                    if done_tx.send((idx, f(item))).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(done_tx);

        // Feed from a separate thread so the collector below can drain results
        // while the bounded job queue is full.
        s.spawn(move || {
            for job in items.into_iter().enumerate() {
                if job_tx.send(job).is_err() {
                    break;
                }
            }
        });

        let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
        for (idx, out) in done_rx.iter() {
            slots[idx] = Some(out);
        }
        slots.into_iter().flatten().collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn preserves_order() {
        let out = map_bounded((0..50).collect(), 4, |n: u32| n * 2);
        assert_eq!(out, (0..50).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn never_exceeds_worker_count() {
        let live = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        map_bounded((0..32).collect(), 3, |_: u32| {
            let now = live.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(2));
            live.fetch_sub(1, Ordering::SeqCst);
        });
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn empty_input() {
        let out: Vec<u8> = map_bounded(Vec::<u8>::new(), 4, |n| n);
        assert!(out.is_empty());
    }
}
