// src/sync/identity.rs

use uuid::Uuid;

// Mapeamento determinístico de IDs locais do cliente para IDs substitutos
// estáveis. Dois dispositivos que referenciam "cartao-1" no mesmo workspace
// convergem para a mesma linha de storage sem nenhuma coordenação, porque o
// ID é um hash do conteúdo (UUIDv5) e não um sorteio.

// Namespace fixo do projeto para derivação v5. Trocar este valor quebraria
// todos os IDs já derivados.
const SURROGATE_NAMESPACE: Uuid = uuid::uuid!("8f9b2ac4-51de-4e79-9cf3-6a07c1f40b25");

// Separador de unidades entre as partes do nome, para "a"+"bc" nunca colidir
// com "ab"+"c".
const PART_SEPARATOR: char = '\u{1f}';

// Namespaces de entidade usados na derivação e na resolução de referências.
pub const NS_WORKSPACE: &str = "workspace";
pub const NS_CARD: &str = "card";
pub const NS_CATEGORY: &str = "category";
pub const NS_PLAN: &str = "installment_plan";
pub const NS_TRANSACTION: &str = "transaction";

/// Deriva o ID substituto de `parts` dentro de `namespace`. Função pura:
/// entradas idênticas produzem sempre a mesma saída, e os bits de versão
/// (v5) marcam o valor como gerado; no formato, indistinguível de um UUID
/// emitido nativamente.
pub fn surrogate_id(namespace: &str, parts: &[&str]) -> Uuid {
    let mut name = String::with_capacity(
        namespace.len() + parts.iter().map(|p| p.len() + 1).sum::<usize>(),
    );
    name.push_str(namespace);
    for part in parts {
        name.push(PART_SEPARATOR);
        name.push_str(part);
    }
    Uuid::new_v5(&SURROGATE_NAMESPACE, name.as_bytes())
}

/// Distingue valores que já são identificadores de strings locais cruas,
/// para nenhum call site mapear duas vezes.
pub fn is_identifier(value: &str) -> bool {
    Uuid::try_parse(value).is_ok()
}

/// Resolve um ID de entidade escopado ao workspace: UUIDs passam direto,
/// qualquer outra string vira substituto determinístico.
pub fn resolve(namespace: &str, workspace_id: Uuid, raw: &str) -> Uuid {
    match Uuid::try_parse(raw) {
        Ok(id) => id,
        Err(_) => {
            let scope = workspace_id.to_string();
            surrogate_id(namespace, &[&scope, raw])
        }
    }
}

/// Caso especial com namespace "workspace": a chave externa arbitrária do
/// tenant vira o ID interno estável.
pub fn workspace_id(key: &str) -> Uuid {
    match Uuid::try_parse(key) {
        Ok(id) => id,
        Err(_) => surrogate_id(NS_WORKSPACE, &[key]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surrogate_id_is_deterministic() {
        let a = surrogate_id("card", &["ws-1", "cartao-1"]);
        let b = surrogate_id("card", &["ws-1", "cartao-1"]);
        assert_eq!(a, b);
    }

    #[test]
    fn namespaces_never_collide() {
        let card = surrogate_id("card", &["x"]);
        let category = surrogate_id("category", &["x"]);
        assert_ne!(card, category);
    }

    #[test]
    fn parts_are_separated() {
        // "a" + "bc" não pode colidir com "ab" + "c"
        assert_ne!(
            surrogate_id("card", &["a", "bc"]),
            surrogate_id("card", &["ab", "c"])
        );
    }

    #[test]
    fn derived_ids_carry_v5_version_bits() {
        let id = surrogate_id("transaction", &["ws", "tx-1"]);
        assert_eq!(id.get_version_num(), 5);
    }

    #[test]
    fn resolve_passes_native_ids_through() {
        let ws = workspace_id("meu-workspace");
        let native = Uuid::new_v4();
        assert_eq!(resolve("card", ws, &native.to_string()), native);
    }

    #[test]
    fn resolve_scopes_by_workspace() {
        let ws_a = workspace_id("workspace-a");
        let ws_b = workspace_id("workspace-b");
        assert_ne!(resolve("card", ws_a, "cartao-1"), resolve("card", ws_b, "cartao-1"));
    }

    #[test]
    fn is_identifier_rejects_raw_strings() {
        assert!(is_identifier("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_identifier("cartao-1"));
    }
}
