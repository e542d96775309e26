use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ========================================
        // CUSTOM_DOMAINS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(CustomDomains::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CustomDomains::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(CustomDomains::AccountId).uuid().not_null())
                    .col(
                        ColumnDef::new(CustomDomains::Domain)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(CustomDomains::Status)
                            .string_len(50)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(CustomDomains::VerificationProvider)
                            .string_len(50)
                            .not_null()
                            .default("ses"),
                    )
                    .col(
                        ColumnDef::new(CustomDomains::ProviderVerificationStatus)
                            .string_len(50)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CustomDomains::ProviderDkimStatus)
                            .string_len(50)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CustomDomains::ProviderDomainId)
                            .string_len(255)
                            .null(),
                    )
                    .col(ColumnDef::new(CustomDomains::DkimTokens).json_binary().null())
                    .col(ColumnDef::new(CustomDomains::DnsRecords).json_binary().not_null())
                    .col(
                        ColumnDef::new(CustomDomains::VerificationAttemptedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CustomDomains::VerifiedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(CustomDomains::FailureReason).text().null())
                    .col(ColumnDef::new(CustomDomains::Metadata).json_binary().null())
                    .col(
                        ColumnDef::new(CustomDomains::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CustomDomains::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Verification loop filters on status and staleness
        manager
            .create_index(
                Index::create()
                    .name("idx_custom_domains_status_attempted")
                    .table(CustomDomains::Table)
                    .col(CustomDomains::Status)
                    .col(CustomDomains::VerificationAttemptedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_custom_domains_account")
                    .table(CustomDomains::Table)
                    .col(CustomDomains::AccountId)
                    .to_owned(),
            )
            .await?;

        // ========================================
        // EMAIL_ADDRESSES TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(EmailAddresses::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(EmailAddresses::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(EmailAddresses::AccountId).uuid().not_null())
                    .col(
                        ColumnDef::new(EmailAddresses::Email)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(EmailAddresses::AddressType)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailAddresses::Status)
                            .string_len(20)
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(EmailAddresses::CustomDomainId).uuid().null())
                    .col(
                        ColumnDef::new(EmailAddresses::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EmailAddresses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(EmailAddresses::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_addresses_custom_domain")
                            .from(EmailAddresses::Table, EmailAddresses::CustomDomainId)
                            .to(CustomDomains::Table, CustomDomains::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_addresses_expiry")
                    .table(EmailAddresses::Table)
                    .col(EmailAddresses::Status)
                    .col(EmailAddresses::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        // ========================================
        // SENT_EMAILS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(SentEmails::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SentEmails::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(SentEmails::AccountId).uuid().not_null())
                    .col(ColumnDef::new(SentEmails::FromEmailId).uuid().not_null())
                    .col(ColumnDef::new(SentEmails::ToRecipients).json_binary().not_null())
                    .col(ColumnDef::new(SentEmails::CcRecipients).json_binary().null())
                    .col(ColumnDef::new(SentEmails::BccRecipients).json_binary().null())
                    .col(ColumnDef::new(SentEmails::Subject).text().not_null())
                    .col(ColumnDef::new(SentEmails::TextContent).text().null())
                    .col(ColumnDef::new(SentEmails::HtmlContent).text().null())
                    .col(ColumnDef::new(SentEmails::Attachments).json_binary().null())
                    .col(ColumnDef::new(SentEmails::Headers).json_binary().null())
                    .col(ColumnDef::new(SentEmails::ThreadId).uuid().null())
                    .col(
                        ColumnDef::new(SentEmails::ScheduledAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SentEmails::SentAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SentEmails::Status)
                            .string_len(20)
                            .not_null()
                            .default("queued"),
                    )
                    .col(
                        ColumnDef::new(SentEmails::ProviderMessageId)
                            .string_len(255)
                            .null(),
                    )
                    .col(ColumnDef::new(SentEmails::FailureReason).text().null())
                    .col(ColumnDef::new(SentEmails::Metadata).json_binary().null())
                    .col(
                        ColumnDef::new(SentEmails::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SentEmails::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sent_emails_from_address")
                            .from(SentEmails::Table, SentEmails::FromEmailId)
                            .to(EmailAddresses::Table, EmailAddresses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Dispatch loops filter on status and due time
        manager
            .create_index(
                Index::create()
                    .name("idx_sent_emails_status_scheduled")
                    .table(SentEmails::Table)
                    .col(SentEmails::Status)
                    .col(SentEmails::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sent_emails_account")
                    .table(SentEmails::Table)
                    .col(SentEmails::AccountId)
                    .to_owned(),
            )
            .await?;

        // ========================================
        // RATE_LIMITS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(RateLimits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RateLimits::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RateLimits::Key).string_len(255).not_null())
                    .col(
                        ColumnDef::new(RateLimits::Count)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RateLimits::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rate_limits_expires_at")
                    .table(RateLimits::Table)
                    .col(RateLimits::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RateLimits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SentEmails::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EmailAddresses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CustomDomains::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum CustomDomains {
    Table,
    Id,
    AccountId,
    Domain,
    Status,
    VerificationProvider,
    ProviderVerificationStatus,
    ProviderDkimStatus,
    ProviderDomainId,
    DkimTokens,
    DnsRecords,
    VerificationAttemptedAt,
    VerifiedAt,
    FailureReason,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EmailAddresses {
    Table,
    Id,
    AccountId,
    Email,
    AddressType,
    Status,
    CustomDomainId,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SentEmails {
    Table,
    Id,
    AccountId,
    FromEmailId,
    ToRecipients,
    CcRecipients,
    BccRecipients,
    Subject,
    TextContent,
    HtmlContent,
    Attachments,
    Headers,
    ThreadId,
    ScheduledAt,
    SentAt,
    Status,
    ProviderMessageId,
    FailureReason,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RateLimits {
    Table,
    Id,
    Key,
    Count,
    ExpiresAt,
}
