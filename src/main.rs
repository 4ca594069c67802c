use serde_json::json;
use service_core::{AdminUser, ExpiringCache, ServiceDataProvider, DEVELOP_VERSION};
use std::error::Error;
use std::io::{self, Write};
use std::time::Duration;

/// Pequeño menú interactivo para administrar servicios, versiones y releases
/// usando el almacenamiento proporcionado por `service-persistence`.
///
/// Opciones soportadas:
/// 1) Ver servicios
/// 2) Crear servicio
/// 3) Ver workflow (borrador o versión)
/// 4) Crear versión a partir del borrador
/// 5) Ver versiones y releases
/// 6) Crear release
/// 7) Promover release (type/stage)
/// 8) Reapuntar release a otra versión
/// 9) Eliminar servicio
/// 10) Cache: escribir / leer
/// 11) Salir
fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    // Inicializar almacenamiento (las migraciones embebidas se aplican en la
    // primera conexión)
    let storage = service_persistence::new_from_env().map_err(|e| Box::new(e) as Box<dyn Error>)?;
    let repo = &storage.store;

    let email = prompt("Email del usuario (enter para admin@localhost): ")?;
    let email = if email.trim().is_empty() { "admin@localhost".to_string() } else { email.trim().to_string() };
    let user = AdminUser::new(0, email.clone(), email.clone(), email);

    loop {
        println!("\n== Service store menu ({}) ==", user);
        println!("1) Ver servicios");
        println!("2) Crear servicio");
        println!("3) Ver workflow (develop o versión)");
        println!("4) Crear versión a partir del borrador");
        println!("5) Ver versiones y releases");
        println!("6) Crear release");
        println!("7) Promover release");
        println!("8) Reapuntar release a otra versión");
        println!("9) Eliminar servicio");
        println!("10) Cache: escribir / leer");
        println!("11) Salir");
        print!("Elige una opción: ");
        io::stdout().flush().ok();

        let mut choice = String::new();
        if io::stdin().read_line(&mut choice)? == 0 {
            break;
        }
        match choice.trim() {
            "1" => match repo.get_all_services(&user) {
                Ok(metas) => {
                    println!("\nSERVICE_ID                 | NAME                       | OWNER");
                    println!("-----------------------------------------------------------------------------------");
                    for m in metas {
                        println!("{:<26} | {:<26} | {}", m.service_id, m.name, m.owner);
                    }
                }
                Err(e) => eprintln!("Error listando servicios: {}", e),
            },
            "2" => {
                let name = prompt("Nombre del servicio: ")?;
                let admins = prompt("Admins (emails separados por coma, enter para ninguno): ")?;
                let admins: Vec<String> = admins.split(',')
                                                .map(|s| s.trim().to_string())
                                                .filter(|s| !s.is_empty())
                                                .collect();
                let private = prompt("¿Privado? (y/N): ")?;
                let is_private = private.trim().eq_ignore_ascii_case("y");
                match repo.create_new_service(&user, name.trim(), admins, is_private, &json!({})) {
                    Ok(id) => println!("Servicio creado: {}", id),
                    Err(e) => eprintln!("Error creando servicio: {}", e),
                }
            }
            "3" => {
                let sid = prompt("Service id: ")?;
                let vid = prompt(&format!("Versión (enter para {}): ", DEVELOP_VERSION))?;
                let vid = if vid.trim().is_empty() { DEVELOP_VERSION } else { vid.trim() };
                match repo.get_service_data(&user, sid.trim(), vid) {
                    Ok(wf) => println!("{}", serde_json::to_string_pretty(&wf)?),
                    Err(e) => eprintln!("Error leyendo workflow: {}", e),
                }
            }
            "4" => {
                let sid = prompt("Service id: ")?;
                let tag = prompt("Tag de la versión (enter para ninguno): ")?;
                let tag = if tag.trim().is_empty() { None } else { Some(tag.trim()) };
                let sid = sid.trim();
                let snapshot = repo.get_service_data(&user, sid, DEVELOP_VERSION)
                                   .and_then(|wf| Ok((wf, repo.get_service_platform_config(&user, sid, DEVELOP_VERSION)?)));
                match snapshot.and_then(|(wf, cfg)| repo.create_service_version(&user, sid, &wf, &cfg, tag)) {
                    Ok(v) => println!("Versión creada: {}", v),
                    Err(e) => eprintln!("Error creando versión: {}", e),
                }
            }
            "5" => {
                let sid = prompt("Service id: ")?;
                let sid = sid.trim();
                match repo.get_all_service_versions(&user, sid) {
                    Ok(vs) => println!("Versiones: {}", if vs.is_empty() { "-".to_string() } else { vs.join(", ") }),
                    Err(e) => eprintln!("Error listando versiones: {}", e),
                }
                match repo.get_all_releases(&user, sid) {
                    Ok(rs) => {
                        println!("\nRELEASE  | VERSION  | PLATFORM   | TYPE         | STAGE    | ALIAS");
                        for r in rs {
                            println!("{} | {} | {:<10} | {:<12} | {:<8} | {}",
                                     r.release_id, r.version_id, r.platform_id, r.release_type, r.stage, r.alias);
                        }
                    }
                    Err(e) => eprintln!("Error listando releases: {}", e),
                }
            }
            "6" => {
                let sid = prompt("Service id: ")?;
                let vid = prompt("Versión a publicar: ")?;
                let platform = prompt("Plataforma: ")?;
                let rtype = prompt("Tipo (ej: development): ")?;
                let stage = prompt("Stage: ")?;
                let alias = prompt("Alias: ")?;
                match repo.create_release(&user,
                                          sid.trim(),
                                          platform.trim(),
                                          rtype.trim(),
                                          stage.trim(),
                                          alias.trim(),
                                          vid.trim())
                {
                    Ok(r) => println!("Release creada: {}", r),
                    Err(e) => eprintln!("Error creando release: {}", e),
                }
            }
            "7" => {
                let sid = prompt("Service id: ")?;
                let rid = prompt("Release id: ")?;
                let rtype = prompt("Nuevo tipo: ")?;
                let stage = prompt("Nuevo stage: ")?;
                match repo.promote_release(&user, sid.trim(), rid.trim(), rtype.trim(), stage.trim()) {
                    Ok(()) => println!("Release promovida"),
                    Err(e) => eprintln!("Error promoviendo release: {}", e),
                }
            }
            "8" => {
                let sid = prompt("Service id: ")?;
                let rid = prompt("Release id: ")?;
                let vid = prompt("Nueva versión: ")?;
                match repo.set_release_version(&user, sid.trim(), rid.trim(), vid.trim()) {
                    Ok(()) => println!("Release reapuntada"),
                    Err(e) => eprintln!("Error reapuntando release: {}", e),
                }
            }
            "9" => {
                let sid = prompt("Service id a eliminar: ")?;
                let confirm = prompt(&format!("Confirma borrado de {}? escribir 'yes' para confirmar: ", sid.trim()))?;
                if confirm.trim().to_lowercase() == "yes" {
                    match repo.delete_service(&user, sid.trim()) {
                        Ok(()) => println!("Servicio eliminado: {}", sid.trim()),
                        Err(e) => eprintln!("Error eliminando servicio: {}", e),
                    }
                } else {
                    println!("Borrado cancelado");
                }
            }
            "10" => {
                let key = prompt("Clave: ")?;
                let value = prompt("Valor (JSON o texto; enter para sólo leer): ")?;
                if !value.trim().is_empty() {
                    let ttl = prompt("TTL en segundos (enter para ninguno): ")?;
                    let ttl = ttl.trim().parse::<u64>().ok().map(Duration::from_secs);
                    let v = serde_json::from_str(value.trim()).unwrap_or_else(|_| json!(value.trim()));
                    match storage.cache.set(key.trim(), &v, ttl) {
                        Ok(true) => println!("Guardado"),
                        Ok(false) => println!("Clave inválida, no se guardó"),
                        Err(e) => eprintln!("Error escribiendo en cache: {}", e),
                    }
                }
                match storage.cache.get(key.trim(), json!(null)) {
                    Ok(v) => println!("{} = {}", key.trim(), v),
                    Err(e) => eprintln!("Error leyendo cache: {}", e),
                }
            }
            "11" => {
                println!("Saliendo...");
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
            }
        }
    }

    Ok(())
}

/// Logs a stderr; nivel por `RUST_LOG` (por defecto `info`). Los registros
/// del facade `log` de las librerías también llegan aquí.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry().with(fmt::layer().with_target(true).with_writer(io::stderr))
                                  .with(filter)
                                  .init();
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}
