/// Length-bucketed byte buffer pool.
pub mod pool;
