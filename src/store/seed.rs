use anyhow::Result;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use chrono::NaiveDate;

use super::Store;
use crate::domain::models::{ProjectDelay, SubmissionStatus, User, UserRole};

struct SeedUser<'a> {
    email: &'a str,
    full_name: &'a str,
    birth_date: &'a str,
    role: UserRole,
    company_name: Option<&'a str>,
}

struct SeedProject<'a> {
    id: &'a str,
    company_name: &'a str,
    project_name: &'a str,
    crowdfunding_link: &'a str,
    promised_date: &'a str,
    actual_date: Option<&'a str>,
    status: SubmissionStatus,
    rating: f64,
    comment: Option<&'a str>,
    submitter_email: &'a str,
    company_reply: Option<&'a str>,
    would_buy_again: Option<bool>,
}

/// Seeds the demo dataset exactly once, and only when BOTH the projects and
/// users collections are empty. A store where just one of the two is empty is
/// left untouched.
pub async fn seed_demo_data(store: &Store) -> Result<()> {
    let projects = store.all_projects().await?;
    let users = store.all_users().await?;
    if !projects.is_empty() || !users.is_empty() {
        return Ok(());
    }

    tracing::info!("Inicializando o banco de dados com dados de exemplo...");
    for user in demo_users()? {
        store.put_user(&user).await?;
    }
    for project in demo_projects()? {
        store.put_project(&project).await?;
    }
    tracing::info!("Banco de dados inicializado.");
    Ok(())
}

fn demo_users() -> Result<Vec<User>> {
    let seeds = vec![
        SeedUser {
            email: "admin@admin.com",
            full_name: "Admin Geral",
            birth_date: "1990-01-01",
            role: UserRole::SiteAdmin,
            company_name: None,
        },
        SeedUser {
            email: "empresa@relogiosgeniais.com",
            full_name: "Gerente de Contas",
            birth_date: "1990-01-01",
            role: UserRole::CompanyAdmin,
            company_name: Some("Relógios Geniais"),
        },
        SeedUser {
            email: "usuario@email.com",
            full_name: "Usuário de Teste",
            birth_date: "1995-05-10",
            role: UserRole::User,
            company_name: None,
        },
        SeedUser {
            email: "outro@email.com",
            full_name: "Outro Usuário",
            birth_date: "1992-03-15",
            role: UserRole::User,
            company_name: None,
        },
        SeedUser {
            email: "feliz@email.com",
            full_name: "Cliente Feliz",
            birth_date: "1988-11-20",
            role: UserRole::User,
            company_name: None,
        },
        SeedUser {
            email: "triste@email.com",
            full_name: "Apoiador Triste",
            birth_date: "2000-07-07",
            role: UserRole::User,
            company_name: None,
        },
        SeedUser {
            email: "jogador@email.com",
            full_name: "Jogador Mestre",
            birth_date: "1998-09-12",
            role: UserRole::User,
            company_name: None,
        },
        SeedUser {
            email: "novo@email.com",
            full_name: "Novo Apoiador",
            birth_date: "2001-01-01",
            role: UserRole::User,
            company_name: None,
        },
        SeedUser {
            email: "duplicado@email.com",
            full_name: "Pessoa Duplicada",
            birth_date: "1999-04-04",
            role: UserRole::User,
            company_name: None,
        },
    ];

    let argon = Argon2::default();
    let mut users = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let salt = SaltString::generate(rand_core::OsRng);
        let hash = argon
            .hash_password(b"password", &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        users.push(User {
            email: seed.email.to_string(),
            password_hash: hash,
            role: seed.role,
            full_name: seed.full_name.to_string(),
            birth_date: seed.birth_date.parse::<NaiveDate>()?,
            company_name: seed.company_name.map(str::to_string),
        });
    }
    Ok(users)
}

fn demo_projects() -> Result<Vec<ProjectDelay>> {
    let seeds = vec![
        SeedProject {
            id: "1",
            company_name: "Relógios Geniais",
            project_name: "Relógio Tempo Certo",
            crowdfunding_link:
                "https://www.kickstarter.com/projects/getpebble/pebble-time-awesome-smartwatch-no-compromises",
            promised_date: "2015-05-30",
            actual_date: Some("2015-07-20"),
            status: SubmissionStatus::Approved,
            rating: 4.0,
            comment: Some("Atrasou um pouco, mas o produto é ótimo!"),
            submitter_email: "usuario@email.com",
            company_reply: None,
            would_buy_again: Some(true),
        },
        SeedProject {
            id: "2",
            company_name: "Cooler & Cia",
            project_name: "O Cooler Mais Legal",
            crowdfunding_link:
                "https://www.kickstarter.com/projects/ryangrepper/coolest-cooler-21st-century-cooler-thats-actually",
            promised_date: "2015-02-01",
            actual_date: Some("2017-08-01"),
            status: SubmissionStatus::Approved,
            rating: 1.5,
            comment: Some("Atraso inaceitável de mais de 2 anos."),
            submitter_email: "outro@email.com",
            company_reply: None,
            would_buy_again: Some(false),
        },
        SeedProject {
            id: "3",
            company_name: "Relógios Geniais",
            project_name: "Relógio Geração 2",
            crowdfunding_link:
                "https://www.kickstarter.com/projects/getpebble/pebble-2-time-2-and-core-an-entirely-new-3g-ultra",
            promised_date: "2016-09-30",
            actual_date: Some("2016-11-15"),
            status: SubmissionStatus::Approved,
            rating: 4.5,
            comment: None,
            submitter_email: "usuario@email.com",
            company_reply: None,
            would_buy_again: Some(true),
        },
        SeedProject {
            id: "4",
            company_name: "Impressoras Pontuais",
            project_name: "Impressora 3D Pro",
            crowdfunding_link: "http://example.com/impressora",
            promised_date: "2023-12-31",
            actual_date: Some("2023-12-25"),
            status: SubmissionStatus::Approved,
            rating: 5.0,
            comment: Some("Entregaram antes do prazo! Fantástico!"),
            submitter_email: "feliz@email.com",
            company_reply: None,
            would_buy_again: Some(true),
        },
        SeedProject {
            id: "5",
            company_name: "VaporWare Inc.",
            project_name: "O Gadget Fantasma",
            crowdfunding_link: "http://example.com/vaporware",
            promised_date: "2022-01-01",
            actual_date: None,
            status: SubmissionStatus::Approved,
            rating: 1.0,
            comment: Some("Nunca entregaram. Fraude."),
            submitter_email: "triste@email.com",
            company_reply: Some(
                "Estamos reestruturando o projeto e em breve teremos novidades.",
            ),
            would_buy_again: Some(false),
        },
        SeedProject {
            id: "6",
            company_name: "Mestres dos Tabuleiros",
            project_name: "Robôs vs Minions",
            crowdfunding_link: "http://example.com/jogos",
            promised_date: "2024-03-01",
            actual_date: None,
            status: SubmissionStatus::Pending,
            rating: 3.0,
            comment: Some("Ainda no aguardo, mas a comunicação tem sido boa."),
            submitter_email: "jogador@email.com",
            company_reply: None,
            would_buy_again: Some(true),
        },
        SeedProject {
            id: "7",
            company_name: "Relógios Geniais",
            project_name: "Smartwatch Fictício 3",
            crowdfunding_link: "http://example.com/relogio3",
            promised_date: "2024-05-01",
            actual_date: None,
            status: SubmissionStatus::Pending,
            rating: 5.0,
            comment: None,
            submitter_email: "novo@email.com",
            company_reply: None,
            would_buy_again: Some(true),
        },
        SeedProject {
            id: "8",
            company_name: "Relógios Geniais",
            project_name: "Relógio Tempo Certo",
            crowdfunding_link:
                "https://www.kickstarter.com/projects/getpebble/pebble-time-awesome-smartwatch-no-compromises",
            promised_date: "2015-06-15",
            actual_date: None,
            status: SubmissionStatus::Pending,
            rating: 4.0,
            comment: Some("Segundo relato para o mesmo projeto."),
            submitter_email: "duplicado@email.com",
            company_reply: None,
            would_buy_again: Some(true),
        },
    ];

    let mut projects = Vec::with_capacity(seeds.len());
    for seed in seeds {
        projects.push(ProjectDelay {
            id: seed.id.to_string(),
            company_name: seed.company_name.to_string(),
            project_name: seed.project_name.to_string(),
            crowdfunding_link: seed.crowdfunding_link.to_string(),
            promised_date: seed.promised_date.parse::<NaiveDate>()?,
            actual_date: seed
                .actual_date
                .map(|raw| raw.parse::<NaiveDate>())
                .transpose()?,
            status: seed.status,
            rating: seed.rating,
            comment: seed.comment.map(str::to_string),
            submitter_email: seed.submitter_email.to_string(),
            company_reply: seed.company_reply.map(str::to_string),
            user_rebuttal: None,
            rejection_reason: None,
            would_buy_again: seed.would_buy_again,
        });
    }
    Ok(projects)
}
