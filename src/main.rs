use std::{process, sync::Arc};

use tokio::{net::TcpListener, signal};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        accounts::AccountService,
        admin::{AdminService, CreateGroupCommand},
        error::AppError,
        follows::FollowService,
        media::MediaStore,
        posts::PostService,
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, PostsRepo, PostsWriteRepo, SessionsRepo,
            UsersRepo,
        },
    },
    cache::PageCache,
    config,
    domain::types::PostId,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState, SessionCookie},
        telemetry,
        uploads::UploadStorage,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Groups(args) => run_groups(settings, args).await,
        config::Command::Users(args) => run_users(settings, args).await,
        config::Command::Posts(args) => run_posts(settings, args).await,
        config::Command::Sessions(args) => run_sessions(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;
    let router = http::build_router(app.http_state);

    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "yatube::serve",
        addr = %settings.server.addr,
        cache_enabled = settings.cache.enabled,
        cache_ttl_secs = settings.cache.ttl.as_secs(),
        "listening"
    );

    let grace = settings.server.graceful_shutdown;
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    // The grace period starts once the listener stops accepting.
    let server = async move {
        server.await.map_err(|err| InfraError::server(err.to_string()))
    };
    tokio::pin!(server);
    tokio::select! {
        result = &mut server => result?,
        _ = async {
            shutdown_signal().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "yatube::serve",
                grace_secs = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "yatube::serve", "server stopped");
    Ok(())
}

async fn run_groups(settings: config::Settings, args: config::GroupsArgs) -> Result<(), AppError> {
    let admin = build_admin_service(&settings).await?;
    match args.command {
        config::GroupsCommand::Create(create) => {
            let group = admin
                .create_group(CreateGroupCommand {
                    title: create.title,
                    slug: create.slug,
                    description: create.description,
                })
                .await?;
            println!("created group {} ({})", group.slug, group.title);
        }
        config::GroupsCommand::Delete(delete) => {
            let group = admin.delete_group(&delete.slug).await?;
            println!("deleted group {}", group.slug);
        }
    }
    Ok(())
}

async fn run_users(settings: config::Settings, args: config::UsersArgs) -> Result<(), AppError> {
    let admin = build_admin_service(&settings).await?;
    match args.command {
        config::UsersCommand::Delete(delete) => {
            let user = admin.delete_user(&delete.username).await?;
            println!("deleted user {}", user.username);
        }
    }
    Ok(())
}

async fn run_posts(settings: config::Settings, args: config::PostsArgs) -> Result<(), AppError> {
    let admin = build_admin_service(&settings).await?;
    match args.command {
        config::PostsCommand::Delete(delete) => {
            if delete.id <= 0 {
                return Err(AppError::validation("post id must be a positive integer"));
            }
            let post = admin.delete_post(PostId(delete.id)).await?;
            println!("deleted post {}", post.id);
        }
    }
    Ok(())
}

async fn run_sessions(
    settings: config::Settings,
    args: config::SessionsArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let accounts = build_account_service(&repositories, &settings);
    match args.command {
        config::SessionsCommand::Purge => {
            let removed = accounts.purge_expired_sessions().await?;
            info!(target = "yatube::sessions", removed, "expired sessions purged");
            println!("removed {removed} expired sessions");
        }
    }
    Ok(())
}

struct ApplicationContext {
    http_state: HttpState,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn init_upload_storage(settings: &config::Settings) -> Result<Arc<UploadStorage>, AppError> {
    let storage = UploadStorage::new(settings.media.directory.clone()).map_err(InfraError::Io)?;
    Ok(Arc::new(storage))
}

fn build_post_service(
    repositories: &Arc<PostgresRepositories>,
    media: Arc<dyn MediaStore>,
) -> PostService {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();

    PostService::new(
        posts_repo,
        posts_write_repo,
        groups_repo,
        users_repo,
        comments_repo,
        media,
    )
}

fn build_account_service(
    repositories: &Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> AccountService {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
    AccountService::new(users_repo, sessions_repo, settings.sessions.ttl)
}

async fn build_admin_service(settings: &config::Settings) -> Result<AdminService, AppError> {
    let repositories = init_repositories(settings).await?;
    let media: Arc<dyn MediaStore> = init_upload_storage(settings)?;

    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();

    Ok(AdminService::new(
        users_repo,
        groups_repo,
        posts_repo,
        posts_write_repo,
        media,
    ))
}

async fn build_application_context(
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let repositories = init_repositories(settings).await?;
    let upload_storage = init_upload_storage(settings)?;

    let media: Arc<dyn MediaStore> = upload_storage.clone();
    let posts = build_post_service(&repositories, media);

    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let follows = FollowService::new(follows_repo, users_repo, posts.clone());

    let accounts = build_account_service(&repositories, settings);

    let body_limit = usize::try_from(settings.media.max_request_bytes.get())
        .map_err(|_| InfraError::configuration("media.max_request_bytes does not fit in memory"))?;

    let http_state = HttpState {
        posts: Arc::new(posts),
        follows: Arc::new(follows),
        accounts: Arc::new(accounts),
        media: upload_storage,
        cache: PageCache::new(settings.cache),
        session_cookie: SessionCookie::new(
            settings.sessions.cookie_name.clone(),
            settings.sessions.secure_cookie,
        ),
        body_limit,
    };

    Ok(ApplicationContext { http_state })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(target = "yatube::serve", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(target = "yatube::serve", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target = "yatube::serve", "shutdown signal received");
}
