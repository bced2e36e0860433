use std::collections::VecDeque;

use crate::logger::CommandContext;

/// Pedido pendente: a consulta crua (ainda não resolvida) e o contexto do
/// comando que a enfileirou.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub query: String,
    pub ctx: CommandContext,
}

/// Fila FIFO de pedidos de uma guild. Sem limite de tamanho; entradas saem
/// exatamente uma vez, quando o avanço as consome.
#[derive(Debug, Default)]
pub struct RequestQueue {
    items: VecDeque<QueuedRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: QueuedRequest) {
        self.items.push_back(request);
    }

    pub fn pop(&mut self) -> Option<QueuedRequest> {
        self.items.pop_front()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consultas pendentes, na ordem de chegada (para o comando `queue`).
    pub fn queries(&self) -> Vec<String> {
        self.items.iter().map(|item| item.query.clone()).collect()
    }
}
