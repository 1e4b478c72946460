use super::*;

#[derive(Debug, Default, Parser)]
pub(crate) struct Solo {}

impl Solo {
    pub(crate) async fn run(self, settings: Settings, cancel: CancellationToken) -> Result {
        let settings = Arc::new(settings);
        let ledger = Arc::new(Ledger::new());

        let chain = Chain::new(&settings, ledger.clone())?;
        chain.spawn(cancel.clone());

        serve_miners(
            settings,
            ledger,
            Link::Solo(chain.clone()),
            StatusSource::Solo(chain),
            cancel,
        )
        .await
    }
}
