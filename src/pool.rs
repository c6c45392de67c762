use std::sync::Mutex;
use std::thread;

/// Runs `task` over `items` on at most `limit` scoped worker threads and
/// returns one slot per item, in input order.
///
/// Workers pull the next item from a shared queue and keep their results
/// locally; slots are filled after every worker has been joined. A slot is
/// `None` only when the worker that owned it panicked.
pub fn run_bounded<T, R, F>(items: Vec<T>, limit: usize, task: F) -> Vec<Option<R>>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let total = items.len();
    let mut slots: Vec<Option<R>> = Vec::with_capacity(total);
    slots.resize_with(total, || None);
    if total == 0 {
        return slots;
    }

    let workers = limit.clamp(1, total);
    let queue = Mutex::new(items.into_iter().enumerate());
    let task = &task;
    let queue = &queue;

    thread::scope(|scope| {
        let handles = (0..workers)
            .map(|_| {
                scope.spawn(move || {
                    let mut local = Vec::new();
                    loop {
                        let next = match queue.lock() {
                            Ok(mut guard) => guard.next(),
                            Err(_) => None,
                        };
                        let Some((idx, item)) = next else {
                            break;
                        };
                        local.push((idx, task(item)));
                    }
                    local
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            match handle.join() {
                Ok(local) => {
                    for (idx, result) in local {
                        slots[idx] = Some(result);
                    }
                }
                Err(_) => tracing::error!("worker thread panicked"),
            }
        }
    });

    slots
}
