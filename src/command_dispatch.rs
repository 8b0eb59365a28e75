//! Purpose: Hold top-level CLI command dispatch for `apigw`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Each command resolves to exactly one JSON value printed by `emit_json`.
//! Invariants: `--all` walks pages with `Paginator` and reports the backend's total.

use std::future::Future;

use apigw_console::api::{
    AlarmRecordQuery, AlarmStrategyQuery, CreateGateway, DownloadedFile, ExportFormat,
    ExportRequest, ExportScope, GatewayHandle, GatewayQuery, GenerateSdk, GrantDimension,
    GrantRequest, Method, Page, Paginator, Payload, PermissionQuery, PluginConfigInput,
    PublishRequest, ReleaseHistoryQuery, RenewRequest, RequestOptions, ResourceInput,
    ResourceQuery, ResponseType, SdkQuery, StageInput, UpdateGateway,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::*;

pub(super) fn dispatch_command(
    command: Command,
    connection: &ConnectionArgs,
) -> Result<RunOutcome, Error> {
    if let Command::Completion { shell } = &command {
        let mut cmd = Cli::command();
        clap_complete::aot::generate(*shell, &mut cmd, "apigw", &mut io::stdout());
        return Ok(RunOutcome::ok());
    }

    let client = build_client(connection, command.name())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to start runtime")
                .with_source(err)
        })?;
    let value = runtime.block_on(run_command(&client, command))?;
    emit_json(value);
    Ok(RunOutcome::ok())
}

async fn run_command(client: &HttpClient, command: Command) -> Result<Value, Error> {
    match command {
        Command::Gateway { command } => gateway_command(client, command).await,
        Command::Stage { gateway, command } => {
            stage_command(&client.gateway(gateway.id), command).await
        }
        Command::Resource { gateway, command } => {
            resource_command(&client.gateway(gateway.id), command).await
        }
        Command::Permission { gateway, command } => {
            permission_command(&client.gateway(gateway.id), command).await
        }
        Command::Plugin { gateway, command } => {
            plugin_command(&client.gateway(gateway.id), command).await
        }
        Command::Release { gateway, command } => {
            release_command(&client.gateway(gateway.id), command).await
        }
        Command::Alarm { gateway, command } => {
            alarm_command(&client.gateway(gateway.id), command).await
        }
        Command::Sdk { gateway, command } => sdk_command(&client.gateway(gateway.id), command).await,
        Command::Request(args) => raw_request(client, args).await,
        Command::Completion { .. } => Ok(Value::Null),
    }
}

async fn gateway_command(client: &HttpClient, command: GatewayCommand) -> Result<Value, Error> {
    match command {
        GatewayCommand::List { keyword, page } => {
            let rows = collect_pages(page, |page| {
                let client = client.clone();
                let query = GatewayQuery {
                    keyword: keyword.clone(),
                    page,
                    ..GatewayQuery::default()
                };
                async move { client.list_gateways(&query).await }
            })
            .await?;
            to_json(&rows)
        }
        GatewayCommand::Get { id } => to_json(&client.get_gateway(id).await?),
        GatewayCommand::Create {
            name,
            description,
            public,
            maintainers,
        } => {
            let body = CreateGateway {
                name,
                description,
                is_public: public,
                maintainers,
            };
            to_json(&client.create_gateway(&body).await?)
        }
        GatewayCommand::Update {
            id,
            description,
            public,
            maintainers,
        } => {
            let body = UpdateGateway {
                description,
                is_public: public,
                maintainers: (!maintainers.is_empty()).then_some(maintainers),
            };
            client.update_gateway(id, &body).await?;
            Ok(json!({ "updated": id }))
        }
        GatewayCommand::Enable { id } => {
            client.update_gateway_status(id, true).await?;
            Ok(json!({ "id": id, "active": true }))
        }
        GatewayCommand::Disable { id } => {
            client.update_gateway_status(id, false).await?;
            Ok(json!({ "id": id, "active": false }))
        }
        GatewayCommand::Delete { id } => {
            client.delete_gateway(id).await?;
            Ok(json!({ "deleted": id }))
        }
    }
}

async fn stage_command(handle: &GatewayHandle, command: StageCommand) -> Result<Value, Error> {
    match command {
        StageCommand::List => to_json(&handle.list_stages().await?),
        StageCommand::Get { id } => to_json(&handle.get_stage(id).await?),
        StageCommand::Create {
            name,
            description,
            vars,
        } => {
            let body = StageInput {
                name,
                description,
                vars: vars.into_iter().collect(),
            };
            to_json(&handle.create_stage(&body).await?)
        }
        StageCommand::Update {
            id,
            name,
            description,
            vars,
        } => {
            let body = StageInput {
                name,
                description,
                vars: vars.into_iter().collect(),
            };
            handle.update_stage(id, &body).await?;
            Ok(json!({ "updated": id }))
        }
        StageCommand::Enable { id } => {
            handle.update_stage_status(id, true).await?;
            Ok(json!({ "id": id, "active": true }))
        }
        StageCommand::Disable { id } => {
            handle.update_stage_status(id, false).await?;
            Ok(json!({ "id": id, "active": false }))
        }
        StageCommand::Delete { id } => {
            handle.delete_stage(id).await?;
            Ok(json!({ "deleted": id }))
        }
    }
}

async fn resource_command(handle: &GatewayHandle, command: ResourceCommand) -> Result<Value, Error> {
    match command {
        ResourceCommand::List {
            keyword,
            method,
            path,
            label_name,
            page,
        } => {
            let base = ResourceQuery {
                keyword,
                method,
                path,
                label_name,
                ..ResourceQuery::default()
            };
            let rows = collect_pages(page, |page| {
                let handle = handle.clone();
                let query = ResourceQuery {
                    page,
                    ..base.clone()
                };
                async move { handle.list_resources(&query).await }
            })
            .await?;
            to_json(&rows)
        }
        ResourceCommand::Get { id } => to_json(&handle.get_resource(id).await?),
        ResourceCommand::Create { body } => {
            let input: ResourceInput = decode_body(&body)?;
            to_json(&handle.create_resource(&input).await?)
        }
        ResourceCommand::Update { id, body } => {
            let input: ResourceInput = decode_body(&body)?;
            handle.update_resource(id, &input).await?;
            Ok(json!({ "updated": id }))
        }
        ResourceCommand::Delete { ids } => {
            handle.delete_resources(&ids).await?;
            Ok(json!({ "deleted": ids }))
        }
        ResourceCommand::Export { format, ids } => {
            let request = ExportRequest {
                export_type: if ids.is_empty() {
                    ExportScope::All
                } else {
                    ExportScope::Selected
                },
                file_type: match format {
                    ExportFormatCli::Yaml => ExportFormat::Yaml,
                    ExportFormatCli::Json => ExportFormat::Json,
                },
                resource_ids: ids,
            };
            let file = handle.export_resources(&request).await?;
            Ok(download_json(&file))
        }
    }
}

async fn permission_command(
    handle: &GatewayHandle,
    command: PermissionCommand,
) -> Result<Value, Error> {
    match command {
        PermissionCommand::List {
            bk_app_code,
            resource_id,
            keyword,
            page,
        } => {
            let base = PermissionQuery {
                bk_app_code,
                resource_id,
                keyword,
                ..PermissionQuery::default()
            };
            let rows = collect_pages(page, |page| {
                let handle = handle.clone();
                let query = PermissionQuery {
                    page,
                    ..base.clone()
                };
                async move { handle.list_app_permissions(&query).await }
            })
            .await?;
            to_json(&rows)
        }
        PermissionCommand::Grant {
            bk_app_code,
            resource_ids,
            expire_days,
        } => {
            let dimension = if resource_ids.is_empty() {
                GrantDimension::Api
            } else {
                GrantDimension::Resource
            };
            let request = GrantRequest {
                bk_app_code,
                dimension,
                expire_days,
                resource_ids,
            };
            handle.grant_app_permissions(&request).await?;
            Ok(json!({ "granted": request.bk_app_code, "resource_ids": request.resource_ids }))
        }
        PermissionCommand::Renew { ids, expire_days } => {
            let request = RenewRequest { ids, expire_days };
            handle.renew_app_permissions(&request).await?;
            Ok(json!({ "renewed": request.ids, "expire_days": expire_days }))
        }
        PermissionCommand::Revoke { ids } => {
            handle.revoke_app_permissions(&ids).await?;
            Ok(json!({ "revoked": ids }))
        }
    }
}

async fn plugin_command(handle: &GatewayHandle, command: PluginCommand) -> Result<Value, Error> {
    match command {
        PluginCommand::Types {
            scope,
            keyword,
            page,
        } => {
            let scope = scope.scope()?;
            let rows = collect_pages(page, |page| {
                let handle = handle.clone();
                let keyword = keyword.clone();
                async move {
                    handle
                        .list_plugin_types(scope, keyword.as_deref(), page)
                        .await
                }
            })
            .await?;
            to_json(&rows)
        }
        PluginCommand::Bindings { code } => to_json(&handle.list_plugin_bindings(&code).await?),
        PluginCommand::Bind {
            scope,
            code,
            name,
            description,
            config,
        } => {
            let yaml = if config == "-" {
                read_text_arg("-")?
            } else {
                read_file(Path::new(&config))?
            };
            let input = PluginConfigInput {
                name,
                description,
                yaml,
            };
            to_json(&handle.bind_plugin(scope.scope()?, &code, &input).await?)
        }
        PluginCommand::Unbind {
            scope,
            code,
            config_id,
        } => {
            handle.unbind_plugin(scope.scope()?, &code, config_id).await?;
            Ok(json!({ "unbound": config_id, "code": code }))
        }
    }
}

async fn release_command(handle: &GatewayHandle, command: ReleaseCommand) -> Result<Value, Error> {
    match command {
        ReleaseCommand::Publish {
            stage_id,
            resource_version_id,
            comment,
        } => {
            let request = PublishRequest {
                stage_id,
                resource_version_id,
                comment,
            };
            to_json(&handle.publish(&request).await?)
        }
        ReleaseCommand::History {
            stage_id,
            created_by,
            since,
            until,
            page,
        } => {
            let base = ReleaseHistoryQuery {
                stage_id,
                created_by,
                time_start: parse_time_arg("--since", since.as_deref())?,
                time_end: parse_time_arg("--until", until.as_deref())?,
                ..ReleaseHistoryQuery::default()
            };
            let rows = collect_pages(page, |page| {
                let handle = handle.clone();
                let query = ReleaseHistoryQuery {
                    page,
                    ..base.clone()
                };
                async move { handle.list_release_histories(&query).await }
            })
            .await?;
            to_json(&rows)
        }
    }
}

async fn alarm_command(handle: &GatewayHandle, command: AlarmCommand) -> Result<Value, Error> {
    match command {
        AlarmCommand::Strategies {
            keyword,
            alarm_type,
            page,
        } => {
            let base = AlarmStrategyQuery {
                keyword,
                alarm_type,
                ..AlarmStrategyQuery::default()
            };
            let rows = collect_pages(page, |page| {
                let handle = handle.clone();
                let query = AlarmStrategyQuery {
                    page,
                    ..base.clone()
                };
                async move { handle.list_alarm_strategies(&query).await }
            })
            .await?;
            to_json(&rows)
        }
        AlarmCommand::Enable { id } => {
            handle.set_alarm_strategy_enabled(id, true).await?;
            Ok(json!({ "id": id, "enabled": true }))
        }
        AlarmCommand::Disable { id } => {
            handle.set_alarm_strategy_enabled(id, false).await?;
            Ok(json!({ "id": id, "enabled": false }))
        }
        AlarmCommand::Records {
            strategy_id,
            status,
            since,
            until,
            page,
        } => {
            let base = AlarmRecordQuery {
                alarm_strategy_id: strategy_id,
                status,
                time_start: parse_time_arg("--since", since.as_deref())?,
                time_end: parse_time_arg("--until", until.as_deref())?,
                ..AlarmRecordQuery::default()
            };
            let rows = collect_pages(page, |page| {
                let handle = handle.clone();
                let query = AlarmRecordQuery {
                    page,
                    ..base.clone()
                };
                async move { handle.list_alarm_records(&query).await }
            })
            .await?;
            to_json(&rows)
        }
    }
}

async fn sdk_command(handle: &GatewayHandle, command: SdkCommand) -> Result<Value, Error> {
    match command {
        SdkCommand::List {
            language,
            keyword,
            page,
        } => {
            let base = SdkQuery {
                language,
                keyword,
                ..SdkQuery::default()
            };
            let rows = collect_pages(page, |page| {
                let handle = handle.clone();
                let query = SdkQuery {
                    page,
                    ..base.clone()
                };
                async move { handle.list_sdks(&query).await }
            })
            .await?;
            to_json(&rows)
        }
        SdkCommand::Generate {
            resource_version_id,
            language,
            version,
        } => {
            let request = GenerateSdk {
                resource_version_id,
                language,
                version,
            };
            to_json(&handle.generate_sdk(&request).await?)
        }
    }
}

async fn raw_request(client: &HttpClient, args: RequestArgs) -> Result<Value, Error> {
    let method: Method = args.method.parse()?;
    let params = match &args.params {
        Some(raw) => read_json_arg(raw)?,
        None => Value::Null,
    };
    let response_type = match args.output {
        OutputKind::Json => ResponseType::Json,
        OutputKind::Text => ResponseType::Text,
        OutputKind::Download => ResponseType::Blob,
    };
    let mut options = RequestOptions::new().with_response_type(response_type);
    for (name, value) in args.headers {
        options = options.with_header(name, value);
    }
    let payload = client.request(method, &args.path, &params, options).await?;
    Ok(match payload {
        Payload::Json(value) => value,
        Payload::Text(text) => json!({ "text": text }),
        Payload::Download(file) => download_json(&file),
    })
}

/// One page, or every page from the requested offset when `--all` is set.
async fn collect_pages<T, F, Fut>(args: PageArgs, mut fetch: F) -> Result<Page<T>, Error>
where
    F: FnMut(PageQuery) -> Fut,
    Fut: Future<Output = Result<Page<T>, Error>>,
{
    if !args.all {
        return fetch(args.query()).await;
    }
    let mut paginator = Paginator::starting_at(args.query());
    let mut results = Vec::new();
    while let Some(query) = paginator.next_query() {
        let page = fetch(query).await?;
        paginator.advance(&page);
        tracing::debug!(offset = query.offset, rows = page.results.len(), "fetched page");
        results.extend(page.results);
    }
    let count = paginator.total().unwrap_or(results.len() as u64);
    Ok(Page { count, results })
}

fn decode_body<T: DeserializeOwned>(raw: &str) -> Result<T, Error> {
    let value = read_json_arg(raw)?;
    serde_json::from_value(value).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("body does not match the expected shape")
            .with_source(err)
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode output json")
            .with_source(err)
    })
}

fn download_json(file: &DownloadedFile) -> Value {
    json!({
        "download": {
            "path": file.path.display().to_string(),
            "file_name": file.file_name,
            "content_type": file.content_type,
            "size": file.size,
        }
    })
}
