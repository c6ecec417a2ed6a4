use std::error::Error;
use std::sync::LazyLock;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::{Mutex, MutexGuard};

use db::DbConfig;

static TEST_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

// The embedded engine's background task lives on whichever runtime opened the
// connection; keep that runtime alive for the whole test binary.
static DB_RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("test runtime")
});

pub async fn setup_db() -> Result<MutexGuard<'static, ()>, Box<dyn Error>> {
    let guard = TEST_LOCK.lock().await;
    DB_RUNTIME
        .spawn(async { db::init(DbConfig::memory()).await })
        .await??;
    let db_conn = db::get_db()?;
    db_conn
        .query("DELETE report; DELETE edit_token; DELETE comment; DELETE media;")
        .await?
        .check()?;
    Ok(guard)
}
