use {
    super::*,
    clap::builder::styling::{AnsiColor, Effects, Styles},
    subcommand::Subcommand,
};

#[derive(Debug, Parser)]
#[command(
  version,
  styles = Styles::styled()
    .error(AnsiColor::Red.on_default() | Effects::BOLD)
    .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
    .invalid(AnsiColor::Red.on_default())
    .literal(AnsiColor::Blue.on_default())
    .placeholder(AnsiColor::Cyan.on_default())
    .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
    .valid(AnsiColor::Green.on_default()),
)]
pub(crate) struct Arguments {
    #[command(flatten)]
    pub(crate) options: Options,
    #[command(subcommand)]
    pub(crate) subcommand: Option<Subcommand>,
}

impl Arguments {
    pub(crate) async fn run(self, cancel_token: CancellationToken) -> Result {
        let settings = Settings::load(self.options)?;

        match self.subcommand {
            Some(subcommand) => subcommand.run(settings, cancel_token).await,
            None => match settings.mode() {
                Some(Mode::Pool) => {
                    subcommand::pool::Pool::default()
                        .run(settings, cancel_token)
                        .await
                }
                Some(Mode::Solo) => {
                    subcommand::solo::Solo::default()
                        .run(settings, cancel_token)
                        .await
                }
                None => bail!(
                    "no mode selected: pass the `pool` or `solo` subcommand, \
                     or set `mode` in the config file"
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommand_is_optional() {
        let arguments = Arguments::try_parse_from(["roost"]).unwrap();
        assert!(arguments.subcommand.is_none());
    }

    #[test]
    fn parse_pool_subcommand() {
        let arguments = Arguments::try_parse_from(["roost", "pool"]).unwrap();
        assert!(matches!(arguments.subcommand, Some(Subcommand::Pool(_))));
    }

    #[test]
    fn parse_solo_with_options() {
        let arguments =
            Arguments::try_parse_from(["roost", "--port", "16200", "solo"]).unwrap();
        assert!(matches!(arguments.subcommand, Some(Subcommand::Solo(_))));
        assert_eq!(arguments.options.port, Some(16200));
    }
}
