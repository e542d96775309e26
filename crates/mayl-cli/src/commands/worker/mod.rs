mod shutdown;

use anyhow::Context;
use clap::Args;
use mayl_core::IntervalScheduler;
use mayl_email::providers::{
    EmailProviderKind, SesSettings, DEFAULT_AWS_REGION, DEFAULT_RESEND_REGION,
};
use mayl_email::store::{
    DbAddressResolver, DbCustomDomainStore, DbHousekeepingStore, DbSendRecordStore,
};
use mayl_email::verification::VerificationProviderType;
use mayl_email::{
    register_jobs, DispatchService, DnsValidator, DomainVerificationService,
    EmailProviderSettings, HousekeepingService, ProviderClients, ProviderCredentials,
    ReconciliationSink, SchedulerSettings, TracingReconciliationSink, VerificationSettings,
    WorkerServices,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use shutdown::wait_for_shutdown_signal;

#[derive(Args)]
pub struct WorkerCommand {
    /// Database connection URL
    #[arg(long, env = "MAYL_DATABASE_URL")]
    pub database_url: String,

    /// Maximum database pool size
    #[arg(long, default_value_t = 20, env = "MAYL_DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,

    /// Minimum database pool size
    #[arg(long, default_value_t = 2, env = "MAYL_DB_MIN_CONNECTIONS")]
    pub db_min_connections: u32,

    /// Primary email provider (ses, resend, sendgrid)
    #[arg(long, env = "MAYL_EMAIL_PROVIDER")]
    pub email_provider: Option<String>,

    /// Provider tried when the primary fails
    #[arg(long, env = "MAYL_FALLBACK_EMAIL_PROVIDER")]
    pub fallback_email_provider: Option<String>,

    /// AWS region for SES
    #[arg(long, default_value = DEFAULT_AWS_REGION, env = "AWS_REGION")]
    pub aws_region: String,

    /// Custom SES endpoint (LocalStack or another SES-compatible service)
    #[arg(long, env = "MAYL_SES_ENDPOINT_URL")]
    pub ses_endpoint_url: Option<String>,

    #[arg(long, env = "RESEND_API_KEY", hide_env_values = true)]
    pub resend_api_key: Option<String>,

    /// Region new Resend domains are created in
    #[arg(long, default_value = DEFAULT_RESEND_REGION, env = "MAYL_RESEND_REGION")]
    pub resend_region: String,

    #[arg(long, env = "SENDGRID_API_KEY", hide_env_values = true)]
    pub sendgrid_api_key: Option<String>,

    /// Comma separated domain verification providers; the first is the default
    #[arg(long, default_value = "ses", env = "MAYL_VERIFICATION_PROVIDERS")]
    pub verification_providers: String,
}

impl WorkerCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    /// SES settings are only built when some configured provider needs them
    fn credentials(
        &self,
        email: &EmailProviderSettings,
        verification: &VerificationSettings,
    ) -> ProviderCredentials {
        let needs_ses = email.kinds().contains(&EmailProviderKind::Ses)
            || verification
                .providers
                .contains(&VerificationProviderType::Ses);

        ProviderCredentials {
            ses: needs_ses.then(|| SesSettings {
                endpoint_url: self.ses_endpoint_url.clone(),
                ..SesSettings::new(self.aws_region.clone())
            }),
            resend_api_key: self.resend_api_key.clone(),
            resend_region: self.resend_region.clone(),
            sendgrid_api_key: self.sendgrid_api_key.clone(),
        }
    }

    async fn run(self) -> anyhow::Result<()> {
        let email_settings = EmailProviderSettings::from_names(
            self.email_provider.as_deref(),
            self.fallback_email_provider.as_deref(),
        )?;
        let verification_settings = VerificationSettings::from_list(&self.verification_providers)?;
        let scheduler_settings = SchedulerSettings::default();

        let credentials = self.credentials(&email_settings, &verification_settings);
        let clients = ProviderClients::connect(&credentials)
            .await
            .context("Failed to initialize provider clients")?;

        let delivery = Arc::new(email_settings.build_delivery(&clients)?);
        if !delivery.is_configured() {
            anyhow::bail!("No email provider configured, set --email-provider");
        }
        let registry = verification_settings.build_registry(&clients)?;

        debug!("Initializing database connection...");
        let db = mayl_database::establish_connection_with_pool(
            &self.database_url,
            self.db_max_connections,
            self.db_min_connections,
        )
        .await?;

        let records = Arc::new(DbSendRecordStore::new(db.clone()));
        let addresses = Arc::new(DbAddressResolver::new(db.clone()));
        let reconciliation = Arc::new(TracingReconciliationSink::new());

        let dispatch = Arc::new(DispatchService::new(
            records,
            addresses,
            delivery,
            reconciliation.clone(),
            scheduler_settings.dispatch_batch_size,
        ));
        let housekeeping = Arc::new(HousekeepingService::new(Arc::new(
            DbHousekeepingStore::new(db.clone()),
        )));

        let verification = if registry.is_empty() {
            warn!("No domain verification provider configured, verification loop disabled");
            None
        } else {
            Some(Arc::new(DomainVerificationService::with_settings(
                Arc::new(DbCustomDomainStore::new(db.clone())),
                registry,
                DnsValidator::new(),
                &scheduler_settings,
            )))
        };

        let services = WorkerServices {
            dispatch,
            housekeeping,
            verification,
        };

        let mut scheduler = IntervalScheduler::new();
        register_jobs(&mut scheduler, &services, &scheduler_settings);
        info!(
            "Mayl worker started with tasks: {}",
            scheduler.task_names().join(", ")
        );

        wait_for_shutdown_signal().await;
        info!("Shutdown signal received, stopping background tasks...");
        scheduler.shutdown().await;

        let lost = reconciliation.count();
        if lost > 0 {
            warn!(
                "{} status write(s) were lost this run, see the mayl_email::reconciliation log",
                lost
            );
        }
        info!("Mayl worker stopped");
        Ok(())
    }
}
