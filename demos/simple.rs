use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use batchload::{BatchFunction, BatchOutput, LoadError, Loader, LoaderConfig};

// Empty functor that implements the BatchFunction trait. For this example, it
// trivially loads values from some HashMap.
struct MyBatchFn;

#[async_trait]
impl BatchFunction<i64, String> for MyBatchFn {
    type Context = HashMap<i64, String>;

    async fn load(keys: &[i64], context: &Self::Context) -> BatchOutput<String> {
        keys.iter()
            .map(|k| {
                context.get(k).cloned().ok_or_else(|| LoadError::msg(format!("no movie {}", k)))
            })
            .collect::<Vec<_>>()
            .into()
    }
}

#[tokio::main]
async fn main() {
    let mut context = HashMap::new();
    context.insert(2001, "a space odyssey".to_owned());
    context.insert(7, "samurai".to_owned());
    context.insert(12, "angry men".to_owned());

    let config = LoaderConfig::new().wait(Duration::from_millis(2)).max_batch(100);
    let loader = Loader::with_config(MyBatchFn {}, context, config);

    assert_eq!(loader.load(7).await.ok().as_deref(), Some("samurai"));
    assert!(loader.load(15).await.is_err());

    let titles = loader.load_all(vec![12, 2010, 2001]).await;
    assert_eq!(titles[0].as_deref().ok(), Some("angry men"));
    assert!(titles[1].is_err());
    assert_eq!(titles[2].as_deref().ok(), Some("a space odyssey"));
}
