use dynpool::{Config, Pool};
use std::{thread, time::{Duration, Instant}};


fn main() {
    let pool = match Pool::with_config(Config::io_bound(), |(a, b): (u64, u64)| {
        thread::sleep(Duration::from_millis(50));
        Ok::<_, String>(a + b)
    }) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("failed to start pool: {}", e);
            std::process::exit(1);
        }
    };

    let now = Instant::now();
    let jobs: Vec<_> = (0..256).map(|i| (1, i)).collect();
    let sum: u64 = pool
        .execute_batch(jobs)
        .into_iter()
        .filter_map(Result::ok)
        .sum();

    println!(
        "workers: {}, sum: {}, elapsed: {:?}",
        pool.size(),
        sum,
        now.elapsed()
    );
    pool.close();
}
